use crate::cli::LessonCommands;
use crate::support::{OrExit, Session, print_json};
use doit_graph::{Lesson, LessonFilter, NewLesson, StoreConfig};
use serde_json::json;

pub fn run(command: LessonCommands, session: &Session, config: &StoreConfig) {
    match command {
        LessonCommands::Record {
            title,
            mistake,
            correction,
            expert,
            components,
            severity,
            issue,
        } => {
            let lesson = session
                .store
                .record_lesson(
                    &session.scope,
                    NewLesson {
                        project_id: session.project_id(),
                        issue_id: issue,
                        title,
                        mistake,
                        correction,
                        expert,
                        components,
                        severity,
                        created_by: session.actor.clone(),
                    },
                )
                .or_exit("failed to record lesson");
            if session.json {
                print_json(&json!({ "action": "lesson.record", "lesson": lesson }));
            } else {
                println!(
                    "doit lesson record\n  Recorded: {}\n  Severity: {}",
                    lesson.id, lesson.severity
                );
            }
        }

        LessonCommands::List {
            status,
            expert,
            component,
            severity,
            limit,
        } => {
            let filter = LessonFilter {
                project_id: session.project_id(),
                status,
                expert,
                component,
                severity,
                limit: limit.map(|l| config.clamp_limit(Some(l))),
            };
            let lessons = session
                .store
                .list_lessons(&session.scope, &filter)
                .or_exit("failed to list lessons");
            if session.json {
                print_json(&json!({
                    "action": "lesson.list",
                    "count": lessons.len(),
                    "items": lessons,
                }));
            } else {
                println!("doit lesson list ({})", lessons.len());
                for lesson in &lessons {
                    print_lesson(lesson);
                }
            }
        }

        LessonCommands::Resolve { id } => {
            let lesson = session
                .store
                .resolve_lesson(&session.scope, &id, &session.actor)
                .or_exit("failed to resolve lesson");
            if session.json {
                print_json(&json!({ "action": "lesson.resolve", "lesson": lesson }));
            } else {
                println!("doit lesson resolve\n  Resolved: {}", lesson.id);
            }
        }
    }
}

fn print_lesson(lesson: &Lesson) {
    println!(
        "  {} [S{}] [{}] {}",
        lesson.id, lesson.severity, lesson.status, lesson.title
    );
    println!("      mistake: {}", lesson.mistake);
    println!("      correction: {}", lesson.correction);
    if !lesson.components.is_empty() {
        println!("      components: {}", lesson.components.join(", "));
    }
}
