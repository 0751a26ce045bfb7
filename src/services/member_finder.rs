//! member_finder.rs
//!
//! Поиск участника с дебаунсом и раскрытием карточки с иждивенцами.
//!
//! Правила:
//! 1.  Каждое нажатие клавиши открывает новое "поколение" поиска. Запрос уходит
//!     только после паузы `debounce`; если за это время пришёл новый ввод,
//!     старое поколение просто завершается.
//! 2.  Ответ применяется, только если его поколение всё ещё последнее
//!     ("последний поиск побеждает"). Поздние ответы выбрасываются.
//! 3.  Раскрыт максимум один участник. Повторный клик сворачивает его без
//!     запроса к серверу.
//! 4.  Ошибка справочника очищает список и карточку, чтобы на экране не
//!     остались чужие иждивенцы. Новый список результатов раскрытую
//!     карточку не трогает: выбор заявителя держится за неё.
//! 5.  401 от справочника не показывается тостом: финдер запоминает
//!     истёкшую авторизацию, владелец проверяет `is_expired`.
//!
//! Все фоновые задачи живут в `JoinSet` и снимаются при drop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::directory::{DirectoryError, MemberDirectory};
use crate::models::{Member, MemberDetails, MemberId};
use crate::notify::{NotificationSink, Severity};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// То, что видит пользователь.
#[derive(Debug, Default)]
struct FinderView {
    // последнее выданное поколение
    latest: u64,
    // поколение, чьи результаты сейчас на экране
    applied: u64,
    term: String,
    members: Vec<Member>,
    expanded: Option<MemberDetails>,
    expired: bool,
}

impl FinderView {
    fn clear(&mut self) {
        self.members.clear();
        self.expanded = None;
    }
}

/// Результат клика по строке участника.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    Expanded(MemberDetails),
    Collapsed,
    Failed(DirectoryError),
}

pub struct MemberFinder {
    directory: Arc<dyn MemberDirectory>,
    notifier: Arc<dyn NotificationSink>,
    debounce: Duration,
    view: Arc<Mutex<FinderView>>,
    tasks: JoinSet<()>,
}

fn lock(view: &Mutex<FinderView>) -> MutexGuard<'_, FinderView> {
    view.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemberFinder {
    pub fn new(
        directory: Arc<dyn MemberDirectory>,
        notifier: Arc<dyn NotificationSink>,
        debounce: Duration,
    ) -> Self {
        Self {
            directory,
            notifier,
            debounce,
            view: Arc::new(Mutex::new(FinderView::default())),
            tasks: JoinSet::new(),
        }
    }

    /// Новый ввод в строке поиска. Возвращает номер поколения.
    pub fn search(&mut self, term: &str) -> u64 {
        while self.tasks.try_join_next().is_some() {}

        let term = term.trim().to_string();
        let generation = {
            let mut view = lock(&self.view);
            view.latest += 1;
            if term.is_empty() {
                // пустая строка - сразу пустой список, без запроса
                view.applied = view.latest;
                view.term.clear();
                view.clear();
                return view.latest;
            }
            view.latest
        };

        let directory = Arc::clone(&self.directory);
        let notifier = Arc::clone(&self.notifier);
        let view = Arc::clone(&self.view);
        let debounce = self.debounce;

        self.tasks.spawn(async move {
            tokio::time::sleep(debounce).await;
            if lock(&view).latest != generation {
                debug!("Member search '{}' superseded before sending", term);
                return;
            }

            let result = directory.search(&term).await;

            let mut view = lock(&view);
            if view.latest != generation {
                debug!("Discarding stale member search results for '{}'", term);
                return;
            }
            view.applied = generation;
            view.term = term;
            match result {
                Ok(members) => {
                    debug!("Member search '{}' returned {} members", view.term, members.len());
                    view.members = members;
                }
                Err(DirectoryError::Unauthorized) => {
                    warn!("Member search '{}' rejected: session expired", view.term);
                    view.clear();
                    view.expired = true;
                }
                Err(e) => {
                    warn!("Member search '{}' failed: {}", view.term, e);
                    view.clear();
                    drop(view);
                    notifier.toast("Не удалось выполнить поиск участников", Severity::Error);
                }
            }
        });

        generation
    }

    /// Клик по участнику: раскрыть, свернуть или переключиться на другого.
    pub async fn toggle(&mut self, member_id: MemberId) -> Expansion {
        {
            let mut view = lock(&self.view);
            if view.expanded.as_ref().is_some_and(|d| d.member.id == member_id) {
                view.expanded = None;
                return Expansion::Collapsed;
            }
            // предыдущий участник сворачивается сразу, не дожидаясь ответа
            view.expanded = None;
        }

        match self.directory.get_by_id(member_id).await {
            Ok(details) => {
                lock(&self.view).expanded = Some(details.clone());
                Expansion::Expanded(details)
            }
            Err(DirectoryError::Unauthorized) => {
                warn!("Member {} lookup rejected: session expired", member_id);
                let mut view = lock(&self.view);
                view.clear();
                view.expired = true;
                Expansion::Failed(DirectoryError::Unauthorized)
            }
            Err(e) => {
                warn!("Member {} lookup failed: {}", member_id, e);
                lock(&self.view).clear();
                self.notifier.toast("Не удалось загрузить данные участника", Severity::Error);
                Expansion::Failed(e)
            }
        }
    }

    /// Свернуть раскрытого участника (если есть).
    pub fn collapse(&mut self) {
        lock(&self.view).expanded = None;
    }

    pub fn results(&self) -> Vec<Member> {
        lock(&self.view).members.clone()
    }

    pub fn term(&self) -> String {
        lock(&self.view).term.clone()
    }

    pub fn expanded(&self) -> Option<MemberDetails> {
        lock(&self.view).expanded.clone()
    }

    /// Справочник ответил 401.
    pub fn is_expired(&self) -> bool {
        lock(&self.view).expired
    }

    /// Поколение, чьи результаты сейчас показаны.
    pub fn applied_generation(&self) -> u64 {
        lock(&self.view).applied
    }

    pub fn is_pending(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Дождаться всех отложенных поисков (и выброшенных тоже).
    pub async fn wait_idle(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

impl Drop for MemberFinder {
    fn drop(&mut self) {
        if !self.tasks.is_empty() {
            debug!("Aborting {} pending member searches", self.tasks.len());
        }
        self.tasks.abort_all();
    }
}
