//! In-memory реализации границ для тестов и демо.
//!
//! `InMemoryBookingGateway` ведёт себя как сервер: проверяет вместимость и
//! пересечения сам и отвечает теми же ошибками, что и REST API.

pub mod directory;
pub mod gateway;
pub mod notify;

pub use directory::MockMemberDirectory;
pub use gateway::{GatewayCall, InMemoryBookingGateway};
pub use notify::{RecordingAuthExpiry, RecordingNotifier};
