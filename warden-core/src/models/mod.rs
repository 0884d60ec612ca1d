pub mod alert;
pub mod data_class;
pub mod data_field;
pub mod endpoint;
pub mod trace;

pub use alert::{Alert, AlertKind};
pub use data_class::{DataClass, Severity};
pub use data_field::{location_key, DataField, DataSection};
pub use endpoint::{
    is_param_token, normalize_path, template_matches, tokenize_template, Endpoint, PathToken,
};
pub use trace::{ApiTrace, NamedValue, TraceMeta, TraceRequest, TraceResponse, TraceUrl};
