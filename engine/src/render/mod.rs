pub mod chart;
pub mod html;

pub use chart::{render_chart, ChartFigure};
pub use html::render_page;
