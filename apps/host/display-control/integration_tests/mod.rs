// Integration tests for the display control host
mod console;
