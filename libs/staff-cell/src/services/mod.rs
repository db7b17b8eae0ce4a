pub mod availability;
pub mod profile;

pub use availability::AvailabilityService;
pub use profile::StaffProfileService;
