mod create;
mod manage;
mod questions;
mod reporting;

pub(super) use create::create_test;
pub(super) use manage::{close_test, get_test, publish_test, update_test};
pub(super) use questions::{add_question, delete_question, update_question};
pub(super) use reporting::{get_summary, list_attempts};
