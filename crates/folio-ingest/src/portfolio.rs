//! Profile record to chunks
//!
//! Each section of the record is rendered as labelled prose and chunked
//! under its own `portfolio/<section>[/<item>]` source label.

use crate::chunker::Chunker;
use folio_core::profile::Portfolio;
use folio_core::Chunk;

/// `ai_ml` -> `Ai Ml`
fn title_case(key: &str) -> String {
    key.split(|c| c == '_' || c == ' ')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Render `Label: value` lines, skipping empty values
fn labelled(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .map(|(label, value)| format!("{label}: {}", value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bullets(header: &str, items: &[String]) -> String {
    let mut text = format!("{header}\n");
    for item in items {
        text.push_str(&format!("- {item}\n"));
    }
    text
}

/// Build every portfolio chunk for a profile record
pub fn portfolio_chunks(portfolio: &Portfolio, chunker: &Chunker) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    let identity = &portfolio.identity;
    let identity_text = labelled(&[
        ("Name", identity.display_name()),
        ("Role", identity.tagline.as_str()),
        ("Summary", identity.summary.as_str()),
        ("Location", identity.location.as_str()),
        ("Years of Experience", identity.years_of_experience.as_str()),
        ("LinkedIn", identity.linkedin.as_str()),
        ("GitHub", identity.github.as_str()),
        ("Portfolio", identity.portfolio_url.as_str()),
    ]);
    if !identity_text.is_empty() {
        chunks.extend(chunker.chunk_prose(
            &format!("About Me:\n{identity_text}"),
            "portfolio/identity",
        ));
    }

    if !portfolio.skills.is_empty() {
        let mut text = String::from("Technical Skills:\n");
        for (category, skills) in &portfolio.skills {
            text.push_str(&format!("\n{}: {}", title_case(category), skills.join(", ")));
        }
        chunks.extend(chunker.chunk_prose(&text, "portfolio/skills"));
    }

    if !portfolio.strengths.is_empty() {
        chunks.extend(chunker.chunk_prose(
            &bullets("Key Strengths:", &portfolio.strengths),
            "portfolio/strengths",
        ));
    }

    for project in &portfolio.projects {
        let tech = project.tech_stack.join(", ");
        let text = labelled(&[
            ("Project", project.name.as_str()),
            ("Description", project.description.as_str()),
            ("Tech Stack", tech.as_str()),
            ("Architecture", project.architecture.as_str()),
            ("Challenges & Solutions", project.challenges.as_str()),
            ("Scalability", project.scalability.as_str()),
            ("Future Plans", project.future.as_str()),
            ("Demo", project.demo_url.as_str()),
            ("GitHub", project.github_url.as_str()),
        ]);
        chunks.extend(
            chunker.chunk_prose(&text, &format!("portfolio/projects/{}", project.name)),
        );
    }

    for cert in &portfolio.certifications {
        let text = labelled(&[
            ("Certification", cert.name.as_str()),
            ("Issued By", cert.issuer.as_str()),
            ("Year", cert.year.as_str()),
            ("Credential ID", cert.credential_id.as_str()),
            ("Skills Gained", cert.skills_gained.as_str()),
        ]);
        chunks.extend(
            chunker.chunk_prose(&text, &format!("portfolio/certifications/{}", cert.name)),
        );
    }

    if !portfolio.achievements.is_empty() {
        let mut text = String::from("Achievements:\n");
        for a in &portfolio.achievements {
            text.push_str(&format!("\n[{}] {}: {}", a.year, a.title, a.description));
            if !a.organization.is_empty() {
                text.push_str(&format!(" (Org: {})", a.organization));
            }
        }
        chunks.extend(chunker.chunk_prose(&text, "portfolio/achievements"));
    }

    for exp in &portfolio.experience {
        let role = format!("{} at {}", exp.title, exp.company);
        let tech = exp.tech.join(", ");
        let text = labelled(&[
            ("Work Experience", role.as_str()),
            ("Duration", exp.duration.as_str()),
            ("Description", exp.description.as_str()),
            ("Technologies Used", tech.as_str()),
        ]);
        chunks.extend(
            chunker.chunk_prose(&text, &format!("portfolio/experience/{}", exp.company)),
        );
    }

    if let Some(edu) = portfolio.education.as_ref().filter(|e| !e.is_empty()) {
        let courses = edu.relevant_courses.join(", ");
        let text = labelled(&[
            ("Education", edu.degree.as_str()),
            ("Institution", edu.institution.as_str()),
            ("Year", edu.year.as_str()),
            ("CGPA", edu.cgpa.as_str()),
            ("Relevant Courses", courses.as_str()),
        ]);
        chunks.extend(chunker.chunk_prose(&text, "portfolio/education"));
    }

    if !portfolio.interests.is_empty() {
        let mut text = String::from("Interests & Career Direction:\n");
        for (key, value) in &portfolio.interests {
            text.push_str(&format!("\n{}: {}", title_case(key), value.joined()));
        }
        chunks.extend(chunker.chunk_prose(&text, "portfolio/interests"));
    }

    if !portfolio.personality_traits.is_empty() {
        chunks.extend(chunker.chunk_prose(
            &bullets("Personality & Work Style:", &portfolio.personality_traits),
            "portfolio/personality",
        ));
    }

    tracing::info!("Portfolio loaded: {} chunks generated", chunks.len());
    chunks
}
