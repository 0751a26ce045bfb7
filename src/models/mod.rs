pub mod allocation;
pub mod member;
pub mod resource;
pub mod time;

pub use allocation::{
    Allocation, AllocationStatus, AuthoritativeAllocation, EventRegistration, FacilityReservation,
};
pub use member::{Dependent, DependentId, Member, MemberDetails, MemberId};
pub use resource::{
    EventId, EventResource, FacilityId, FacilityResource, FacilityStatus, ResourceRef,
};
pub use time::{LocalClock, TimeRange};
