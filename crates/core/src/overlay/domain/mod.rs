pub mod display_mapper;
pub mod overlay_positioner;
pub mod render_sink;
