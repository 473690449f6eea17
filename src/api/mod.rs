pub mod attendance;
pub mod clockout_link;
pub mod employee;
