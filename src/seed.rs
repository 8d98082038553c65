//! Demo dataset: three contributors, three instructors, three courses, and
//! one photo per course. Loaded at startup when `SEED_DEMO=true`, and used
//! by the integration suite as its fixture.

use chrono::{TimeZone, Utc};
use tracing::info;

use crate::models::{ContributorInput, CourseInput, InstructorInput, PhotoInput};
use crate::store::Store;

pub fn load_demo_data(store: &Store) {
    let contributors = [
        ("u001", "Ana Costa", "ana@email.com"),
        ("u002", "Bruno Lima", "bruno@email.com"),
        ("u003", "Carla Mendes", "carla@email.com"),
    ];
    for (id, name, email) in contributors {
        store
            .insert_contributor_with_id(
                id.to_string(),
                ContributorInput {
                    name: name.to_string(),
                    email: email.to_string(),
                },
            )
            .unwrap();
    }

    let instructors = [
        ("p001", "Prof. João Silva"),
        ("p002", "Profa. Marina Alves"),
        ("p003", "Prof. Ricardo Borges"),
    ];
    for (id, name) in instructors {
        store
            .insert_instructor_with_id(
                id.to_string(),
                InstructorInput {
                    name: name.to_string(),
                },
            )
            .unwrap();
    }

    let courses = [
        ("d001", "Algoritmos", "1º", "p001"),
        ("d002", "Banco de Dados", "3º", "p002"),
        ("d003", "Engenharia de Software", "4º", "p003"),
    ];
    for (id, name, term, instructor_id) in courses {
        store
            .insert_course_with_id(
                id.to_string(),
                CourseInput {
                    name: name.to_string(),
                    term: term.to_string(),
                    instructor_id: instructor_id.to_string(),
                },
            )
            .unwrap();
    }

    let photos = [
        (
            "u001",
            "d001",
            "p001",
            "1º",
            (28, 10, 30),
            "https://exemplo.com/fotos/aula1_algoritmos.jpg",
            "Introdução a algoritmos - aula 1",
        ),
        (
            "u002",
            "d002",
            "p002",
            "3º",
            (28, 14, 0),
            "https://exemplo.com/fotos/aula_bd.jpg",
            "Modelo relacional - exemplos em sala",
        ),
        (
            "u003",
            "d003",
            "p003",
            "4º",
            (29, 9, 0),
            "https://exemplo.com/fotos/esw_diagrama.jpg",
            "Casos de uso - diagrama da aula",
        ),
    ];
    for (contributor_id, course_id, instructor_id, term, (day, hour, minute), url, description) in
        photos
    {
        store
            .insert_photo(PhotoInput {
                contributor_id: contributor_id.to_string(),
                course_id: course_id.to_string(),
                instructor_id: instructor_id.to_string(),
                term: term.to_string(),
                photo_url: url.to_string(),
                description: Some(description.to_string()),
                uploaded_at: Some(Utc.with_ymd_and_hms(2025, 7, day, hour, minute, 0).unwrap()),
            })
            .unwrap();
    }

    info!("Demo dataset loaded");
}
