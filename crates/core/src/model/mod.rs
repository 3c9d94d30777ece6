mod ids;
pub mod path;
mod record;
pub mod schema;

pub use ids::{NodeId, RemoteId};
pub use path::{ParsePathError, Path};
pub use record::{PendingRecord, RemoteRecord, SnapshotRecord};
pub use schema::{
    Course, CourseDraft, CourseUnit, Lesson, LessonDraft, LessonSection, SchemaEntity, SchemaError,
    UnitDraft,
};
