//! Unit and end-to-end tests for the placemark CLI.

use super::*;

mod unit;
