pub mod report;
pub mod symbols;

pub use report::{render_report, RenderedReport, ReportSink, ReportWriter};
pub use symbols::{load_symbols, read_symbols};
