mod controller;

pub use controller::{TouchAction, TouchController, TouchEvent};
