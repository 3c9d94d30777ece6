#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use progress_core::model::{Course, CourseDraft, LessonDraft, Path, UnitDraft};
use progress_core::progress::{ProgressContext, ProgressNode};
use progress_core::time::fixed_now;
use services::{AuthSession, Clock, Credential, InMemoryRemote, SyncService};

pub const EMAIL: &str = "ada@example.com";

/// One unit at `[unit]` holding one lesson with a lab and review questions,
/// so its leaves are `[unit,1,0]`, `[unit,1,1]` and `[unit,1,2]`.
pub fn course_with_unit(unit: u32) -> Course {
    CourseDraft {
        title: "Intro to Swift".into(),
        version: 1,
        units: vec![UnitDraft {
            index_path: Some(Path::from([unit])),
            title: "Getting Started".into(),
            lessons: vec![LessonDraft {
                index_path: None,
                title: "Constants and Variables".into(),
                has_lab: true,
                review_questions: 5,
            }],
        }],
    }
    .validate()
    .expect("valid course")
}

pub fn built(course: &Course) -> ProgressContext {
    let mut ctx = ProgressContext::new();
    ctx.build(course).expect("build");
    ctx
}

pub fn set_completed(ctx: &mut ProgressContext, path: &Path, at: Option<DateTime<Utc>>) {
    let tree = ctx.tree_mut().expect("tree");
    let id = tree.lookup(path).expect("registered");
    tree.set_completion(id, at).expect("leaf");
}

pub fn node<'a>(ctx: &'a ProgressContext, path: &Path) -> &'a ProgressNode {
    ctx.tree()
        .expect("tree")
        .get_by_path(path)
        .expect("registered")
}

/// Remote that accepts the returned session's credential.
pub fn signed_in() -> (InMemoryRemote, AuthSession) {
    let remote = InMemoryRemote::new();
    let credential = Credential::new("session-test");
    remote.accept(&credential, EMAIL);
    (remote, AuthSession::with_credential(credential))
}

pub fn sync_service(remote: &InMemoryRemote, session: &AuthSession) -> SyncService {
    SyncService::new(
        Clock::fixed(fixed_now()),
        Arc::new(remote.clone()),
        session.clone(),
    )
}
