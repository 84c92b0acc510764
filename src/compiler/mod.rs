pub mod event;
pub mod expander;
pub mod loop_window;
pub mod tab_compiler;
pub mod tempo;
