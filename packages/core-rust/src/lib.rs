//! Formgrid core: field descriptors, schemas, the computed-field engine,
//! form input normalization, import validation, and read-side views.

pub mod clock;
pub mod coerce;
pub mod compute;
pub mod error;
pub mod field;
pub mod import;
pub mod normalize;
pub mod notice;
pub mod payload;
pub mod record;
pub mod schema;
pub mod session;
pub mod view;

pub use clock::{Clock, FixedClock, SystemClock};
pub use compute::{backfill_computed, compute_derived, LicenseStatus};
pub use error::{FormError, SchemaError, SessionError};
pub use field::{FieldDescriptor, FieldKind};
pub use import::prepare_import;
pub use normalize::normalize;
pub use notice::{Notice, NoticeBoard, NoticeKind};
pub use payload::build_payload;
pub use record::{Record, RecordId};
pub use schema::{RequiredFor, Schema, SchemaConfig};
pub use session::{LoadTicket, Selection, Session, SubmitTarget, Submission};
pub use view::{export_records, import_template, table_view, Cell, TableRow, TableView};

