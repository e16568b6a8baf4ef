//! Integration tests: HTTP surface and end-to-end reminder flow.

mod helpers;
mod queue_api_test;
mod reminder_flow_test;
