//! Integration tests

mod api_test;
mod config_test;
mod feed_test;
mod scenario_test;
mod support;
mod ws_test;
