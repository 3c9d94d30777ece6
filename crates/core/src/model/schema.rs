use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::path::Path;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SchemaError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course has no units")]
    NoUnits,

    #[error("{entity} path cannot be empty")]
    EmptyPath { entity: &'static str },

    #[error("{entity} path {path} collides with the course root")]
    RootCollision { entity: &'static str, path: Path },

    #[error("duplicate path {path} in course schema")]
    DuplicatePath { path: Path },
}

//
// ─── DRAFTS (as read from the course file) ─────────────────────────────────────
//

/// Course document as stored in the bundled schema file.
///
/// Paths are optional; missing ones are derived from position when the
/// draft is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDraft {
    pub title: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub units: Vec<UnitDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<Path>,
    pub title: String,
    #[serde(default)]
    pub lessons: Vec<LessonDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<Path>,
    pub title: String,
    #[serde(default)]
    pub has_lab: bool,
    #[serde(default)]
    pub review_questions: u32,
}

impl CourseDraft {
    /// Resolve paths and check that every structural unit has a distinct one.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for an empty title, a course without units,
    /// empty paths, a path equal to the root, or duplicate paths (including
    /// the lesson component paths derived from them).
    pub fn validate(self) -> Result<Course, SchemaError> {
        if self.title.trim().is_empty() {
            return Err(SchemaError::EmptyTitle);
        }
        if self.units.is_empty() {
            return Err(SchemaError::NoUnits);
        }

        let units = self
            .units
            .into_iter()
            .zip(1u32..)
            .map(|(unit, position)| unit.resolve(position))
            .collect::<Result<Vec<_>, _>>()?;

        let course = Course {
            title: self.title,
            version: self.version,
            units,
        };

        let root = Path::root();
        let mut seen = HashSet::from([root.clone()]);
        for entity in course.entities().into_iter().skip(1) {
            let path = entity.path();
            if path == root {
                return Err(SchemaError::RootCollision {
                    entity: entity.kind(),
                    path,
                });
            }
            if !seen.insert(path.clone()) {
                return Err(SchemaError::DuplicatePath { path });
            }
        }

        Ok(course)
    }
}

impl UnitDraft {
    fn resolve(self, position: u32) -> Result<CourseUnit, SchemaError> {
        let path = self
            .index_path
            .unwrap_or_else(|| Path::new(vec![position]));
        if path.is_empty() {
            return Err(SchemaError::EmptyPath { entity: "unit" });
        }
        let lessons = self
            .lessons
            .into_iter()
            .zip(1u32..)
            .map(|(lesson, index)| lesson.resolve(&path, index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CourseUnit {
            path,
            title: self.title,
            lessons,
        })
    }
}

impl LessonDraft {
    fn resolve(self, unit_path: &Path, position: u32) -> Result<Lesson, SchemaError> {
        let path = self
            .index_path
            .unwrap_or_else(|| unit_path.child(position));
        if path.is_empty() {
            return Err(SchemaError::EmptyPath { entity: "lesson" });
        }
        Ok(Lesson {
            path,
            title: self.title,
            has_lab: self.has_lab,
            review_questions: self.review_questions,
        })
    }
}

//
// ─── VALIDATED SCHEMA ──────────────────────────────────────────────────────────
//

/// Immutable course outline. The only input to progress tree construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    title: String,
    version: u32,
    units: Vec<CourseUnit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseUnit {
    path: Path,
    title: String,
    lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    path: Path,
    title: String,
    has_lab: bool,
    review_questions: u32,
}

/// Trackable parts of a lesson; the discriminant is the last path index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LessonSection {
    Reading = 0,
    Lab = 1,
    Review = 2,
}

impl LessonSection {
    pub const ALL: [LessonSection; 3] = [Self::Reading, Self::Lab, Self::Review];

    #[must_use]
    pub fn index(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.index() == index)
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Reading => "Chapter Reading",
            Self::Lab => "Lab Exercise",
            Self::Review => "Review Questions",
        }
    }
}

impl Course {
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn units(&self) -> &[CourseUnit] {
        &self.units
    }

    #[must_use]
    pub fn path(&self) -> Path {
        Path::root()
    }

    /// Every schema entity in depth-first order, course first.
    #[must_use]
    pub fn entities(&self) -> Vec<SchemaEntity<'_>> {
        let mut out = Vec::new();
        let mut stack = vec![SchemaEntity::Course(self)];
        while let Some(entity) = stack.pop() {
            let mut children = entity.children();
            children.reverse();
            stack.extend(children);
            out.push(entity);
        }
        out
    }

    /// Finds the entity with the given path.
    #[must_use]
    pub fn find(&self, path: &Path) -> Option<SchemaEntity<'_>> {
        self.entities().into_iter().find(|e| &e.path() == path)
    }
}

impl CourseUnit {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }
}

impl Lesson {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn has_lab(&self) -> bool {
        self.has_lab
    }

    #[must_use]
    pub fn review_questions(&self) -> u32 {
        self.review_questions
    }

    /// Sections this lesson tracks. Reading is always present.
    #[must_use]
    pub fn sections(&self) -> Vec<LessonSection> {
        let mut sections = vec![LessonSection::Reading];
        if self.has_lab {
            sections.push(LessonSection::Lab);
        }
        if self.review_questions > 0 {
            sections.push(LessonSection::Review);
        }
        sections
    }
}

/// One structural unit of the course, viewed uniformly for tree expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaEntity<'a> {
    Course(&'a Course),
    Unit(&'a CourseUnit),
    Lesson(&'a Lesson),
    Component {
        lesson: &'a Lesson,
        section: LessonSection,
    },
}

impl<'a> SchemaEntity<'a> {
    #[must_use]
    pub fn path(&self) -> Path {
        match self {
            Self::Course(course) => course.path(),
            Self::Unit(unit) => unit.path.clone(),
            Self::Lesson(lesson) => lesson.path.clone(),
            Self::Component { lesson, section } => lesson.path.child(section.index()),
        }
    }

    #[must_use]
    pub fn title(&self) -> &'a str {
        match *self {
            Self::Course(course) => &course.title,
            Self::Unit(unit) => &unit.title,
            Self::Lesson(lesson) => &lesson.title,
            Self::Component { section, .. } => section.title(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Course(_) => "course",
            Self::Unit(_) => "unit",
            Self::Lesson(_) => "lesson",
            Self::Component { .. } => "component",
        }
    }

    /// Direct structural children, in schema order.
    #[must_use]
    pub fn children(&self) -> Vec<SchemaEntity<'a>> {
        match *self {
            Self::Course(course) => course.units.iter().map(SchemaEntity::Unit).collect(),
            Self::Unit(unit) => unit.lessons.iter().map(SchemaEntity::Lesson).collect(),
            Self::Lesson(lesson) => lesson
                .sections()
                .into_iter()
                .map(|section| SchemaEntity::Component { lesson, section })
                .collect(),
            Self::Component { .. } => Vec::new(),
        }
    }
}
