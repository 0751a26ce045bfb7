use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{
    AllocationPayload, BookingError, BookingGateway, CatalogSource, ResourceSnapshot,
};
use crate::api_client::ApiClient;
use crate::models::{
    Allocation, AuthoritativeAllocation, DependentId, EventRegistration, EventResource,
    FacilityReservation, FacilityResource, MemberId, ResourceRef, TimeRange,
};

// --- Модели ответов API ---

#[derive(Debug, Deserialize)]
struct EventDetailsResponse {
    event: EventResource,
    #[serde(default)]
    registrations: Vec<EventRegistration>,
}

#[derive(Debug, Deserialize)]
struct FacilityDetailsResponse {
    facility: FacilityResource,
    #[serde(default)]
    reservations: Vec<FacilityReservation>,
}

// --- Модели запросов ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRegistrationRequest<'a> {
    member_id: MemberId,
    quantity: u32,
    dependent_ids: &'a [DependentId],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRegistrationRequest<'a> {
    quantity: u32,
    dependent_ids: &'a [DependentId],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReservationRequest {
    member_id: MemberId,
    #[serde(flatten)]
    interval: TimeRange,
}

/// Клиент API бронирований поверх общего `ApiClient`.
#[derive(Clone)]
pub struct RestBookingGateway {
    api: ApiClient,
}

impl RestBookingGateway {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn collection_path(resource: ResourceRef) -> String {
        match resource {
            ResourceRef::Event(id) => format!("events/{}/registrations", id),
            ResourceRef::Facility(id) => format!("facilities/{}/reservations", id),
        }
    }

    fn item_path(resource: ResourceRef, requester: MemberId) -> String {
        format!("{}/{}", Self::collection_path(resource), requester)
    }

    fn ensure_matches(resource: ResourceRef, payload: &AllocationPayload) -> Result<(), BookingError> {
        payload.validate()?;
        if !payload.matches(resource) {
            return Err(BookingError::Validation(format!(
                "payload does not match resource {}",
                resource
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BookingGateway for RestBookingGateway {
    async fn fetch_resource_with_allocations(
        &self,
        resource: ResourceRef,
        date: Option<NaiveDate>,
    ) -> Result<ResourceSnapshot, BookingError> {
        match resource {
            ResourceRef::Event(id) => {
                if date.is_some() {
                    debug!("Ignoring date for event {} snapshot", id);
                }
                let details: EventDetailsResponse = self.api.get(&format!("events/{}", id), &[]).await?;
                Ok(ResourceSnapshot::Event {
                    resource: details.event,
                    registrations: details.registrations,
                })
            }
            ResourceRef::Facility(id) => {
                let date = date.ok_or_else(|| {
                    BookingError::Validation("date is required for facility availability".to_string())
                })?;
                let details: FacilityDetailsResponse = self
                    .api
                    .get(
                        &Self::collection_path(resource),
                        &[("date", date.format("%Y-%m-%d").to_string())],
                    )
                    .await?;
                if details.facility.id != id {
                    warn!("Facility {} snapshot returned facility {}", id, details.facility.id);
                }
                Ok(ResourceSnapshot::Facility {
                    resource: details.facility,
                    date,
                    reservations: details.reservations,
                })
            }
        }
    }

    async fn create_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
        payload: &AllocationPayload,
    ) -> Result<AuthoritativeAllocation, BookingError> {
        Self::ensure_matches(resource, payload)?;
        let path = Self::collection_path(resource);
        info!("Creating allocation on {} for member {}", resource, requester);

        let allocation = match payload {
            AllocationPayload::Registration(p) => {
                let body = CreateRegistrationRequest {
                    member_id: requester,
                    quantity: p.quantity,
                    dependent_ids: &p.dependent_ids,
                };
                Allocation::Registration(self.api.post(&path, &body).await?)
            }
            AllocationPayload::Reservation(p) => {
                let body = CreateReservationRequest { member_id: requester, interval: p.interval };
                Allocation::Reservation(self.api.post(&path, &body).await?)
            }
        };

        Ok(AuthoritativeAllocation::from_gateway(allocation))
    }

    async fn update_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
        payload: &AllocationPayload,
    ) -> Result<AuthoritativeAllocation, BookingError> {
        Self::ensure_matches(resource, payload)?;
        let path = Self::item_path(resource, requester);
        info!("Updating allocation on {} for member {}", resource, requester);

        let allocation = match payload {
            AllocationPayload::Registration(p) => {
                let body = UpdateRegistrationRequest {
                    quantity: p.quantity,
                    dependent_ids: &p.dependent_ids,
                };
                Allocation::Registration(self.api.patch(&path, &body).await?)
            }
            AllocationPayload::Reservation(p) => {
                Allocation::Reservation(self.api.patch(&path, &p.interval).await?)
            }
        };

        Ok(AuthoritativeAllocation::from_gateway(allocation))
    }

    async fn cancel_allocation(
        &self,
        resource: ResourceRef,
        requester: MemberId,
    ) -> Result<(), BookingError> {
        info!("Cancelling allocation on {} for member {}", resource, requester);
        self.api.delete(&Self::item_path(resource, requester)).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogSource for RestBookingGateway {
    async fn list_events(&self) -> Result<Vec<EventResource>, BookingError> {
        Ok(self.api.get("events", &[]).await?)
    }

    async fn list_facilities(&self) -> Result<Vec<FacilityResource>, BookingError> {
        Ok(self.api.get("facilities", &[]).await?)
    }
}
