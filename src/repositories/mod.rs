pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod course_memberships;
pub(crate) mod courses;
pub(crate) mod health;
pub(crate) mod questions;
pub(crate) mod tests;
pub(crate) mod users;
