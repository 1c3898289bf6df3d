pub mod terminal_overlay;
