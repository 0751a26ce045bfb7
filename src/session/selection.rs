use std::collections::BTreeSet;
use thiserror::Error;

use crate::models::{DependentId, MemberDetails};
use crate::services::capacity::{IntervalRejection, QuantityRejection};

/// Почему действие в UI сейчас недоступно. Это сигнал, а не ошибка коммита.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Disabled {
    #[error("участник не выбран")]
    NoMemberSelected,
    #[error("никто не отмечен")]
    NothingSelected,
    #[error("свободных мест нет (доступно {available})")]
    CapacityReached { available: u32 },
    #[error("у участника нет такого иждивенца")]
    UnknownDependent,
    #[error("интервал не выбран")]
    NoSlotChosen,
    #[error(transparent)]
    Interval(#[from] IntervalRejection),
    #[error(transparent)]
    Quantity(#[from] QuantityRejection),
    #[error("количество не изменилось")]
    Unchanged,
    #[error("запись уже отменена")]
    AlreadyCancelled,
    #[error("идёт отправка")]
    Committing,
}

/// Выбор заявителя внутри сессии; никуда не сохраняется.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterSelection {
    selected_member: Option<MemberDetails>,
    member_included: bool,
    selected_dependent_ids: BTreeSet<DependentId>,
}

impl RequesterSelection {
    pub fn selected_member(&self) -> Option<&MemberDetails> {
        self.selected_member.as_ref()
    }

    pub fn member_included(&self) -> bool {
        self.member_included
    }

    pub fn selected_dependent_ids(&self) -> &BTreeSet<DependentId> {
        &self.selected_dependent_ids
    }

    /// `(участник учтён ? 1 : 0) + |отмеченные иждивенцы|`.
    pub fn requested_quantity(&self) -> u32 {
        let dependents = u32::try_from(self.selected_dependent_ids.len()).unwrap_or(u32::MAX);
        u32::from(self.member_included).saturating_add(dependents)
    }

    pub fn is_empty(&self) -> bool {
        self.selected_member.is_none()
    }

    /// Выбор нового участника сбрасывает частичный выбор предыдущего.
    pub(crate) fn select(&mut self, details: MemberDetails) {
        *self = RequesterSelection { selected_member: Some(details), ..Default::default() };
    }

    pub(crate) fn clear(&mut self) {
        *self = RequesterSelection::default();
    }

    pub(crate) fn set_member_included(&mut self, included: bool) {
        self.member_included = included;
    }

    pub(crate) fn insert_dependent(&mut self, id: DependentId) -> Result<(), Disabled> {
        let member = self.selected_member.as_ref().ok_or(Disabled::NoMemberSelected)?;
        if !member.has_dependent(id) {
            return Err(Disabled::UnknownDependent);
        }
        self.selected_dependent_ids.insert(id);
        Ok(())
    }

    pub(crate) fn remove_dependent(&mut self, id: DependentId) -> bool {
        self.selected_dependent_ids.remove(&id)
    }

    pub(crate) fn dependent_ids(&self) -> Vec<DependentId> {
        self.selected_dependent_ids.iter().copied().collect()
    }
}
