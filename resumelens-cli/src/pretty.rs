use anyhow::Result;
use resumelens::models::{
    AdminResumePage, AdminStats, AnalysisResult, AtsResumeSummary, AtsScoreRecord, FeedbackItem,
    HistoryEntry, Job, Page, Pagination, RecommendationRecord, ScoreComponent, SkillAnalysisRecord,
    SkillCategory, TextAnalysis, UserSummary,
};
use resumelens::sections::{ContactKind, DisplaySection, SectionBody};
use std::collections::BTreeMap;
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn stdout() -> StandardStream {
    StandardStream::stdout(if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    })
}

/// Traffic-light color for a 0-100 score
pub fn score_color(score: f64) -> Color {
    if score >= 80.0 {
        Color::Green
    } else if score >= 60.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn write_score(out: &mut StandardStream, score: f64) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(score_color(score))).set_bold(true))?;
    write!(out, "{:>5.1}", score)?;
    out.reset()?;
    Ok(())
}

fn write_heading(out: &mut StandardStream, text: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    writeln!(out, "\n{}", text)?;
    out.reset()?;
    Ok(())
}

fn write_breakdown(
    out: &mut StandardStream,
    breakdown: &BTreeMap<String, ScoreComponent>,
) -> Result<()> {
    if breakdown.is_empty() {
        return Ok(());
    }
    write_heading(out, "Breakdown")?;
    for (name, component) in breakdown.iter() {
        write!(out, "  {:<28.28}", name.replace('_', " "))?;
        write_score(out, component.score)?;
        writeln!(out, "  {}", component.label)?;
    }
    Ok(())
}

pub fn pp_analysis(result: &AnalysisResult) -> Result<()> {
    let mut out = stdout();
    write!(&mut out, "ATS score: ")?;
    write_score(&mut out, result.ats_score)?;
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(&mut out, "   (resume {})", result.resume_id)?;
    out.reset()?;

    write_breakdown(&mut out, &result.breakdown)?;
    pp_skills_to(&mut out, &result.skills)?;

    let missing = &result.missing_skills;
    if missing.has_job_description {
        write_heading(&mut out, "Job description match")?;
        write!(&mut out, "  match")?;
        write_score(&mut out, missing.match_percentage)?;
        writeln!(&mut out)?;
    }
    for (label, skills, color) in [
        ("critical", &missing.critical, Color::Red),
        ("recommended", &missing.recommended, Color::Yellow),
        ("soft", &missing.soft, Color::Magenta),
    ] {
        if skills.is_empty() {
            continue;
        }
        out.set_color(ColorSpec::new().set_fg(Some(color)))?;
        write!(&mut out, "  missing {:<12}", label)?;
        out.reset()?;
        writeln!(&mut out, "{}", skills.join(", "))?;
    }

    if !result.recommended_jobs.is_empty() {
        write_heading(&mut out, "Recommended jobs")?;
        write_jobs(&mut out, &result.recommended_jobs)?;
    }
    Ok(())
}

/// Quick text analysis: score, breakdown, skills and the scorer's suggestions
pub fn pp_text_analysis(result: &TextAnalysis) -> Result<()> {
    let mut out = stdout();
    write!(&mut out, "ATS score: ")?;
    write_score(&mut out, result.ats_score)?;
    writeln!(&mut out)?;
    write_breakdown(&mut out, &result.ats_breakdown)?;
    pp_skills_to(&mut out, &result.skills)?;
    if !result.recommendations.is_empty() {
        write_heading(&mut out, "Suggestions")?;
        for rec in &result.recommendations {
            // plain strings, or objects with a message
            let text = rec
                .as_str()
                .or_else(|| rec["message"].as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| rec.to_string());
            writeln!(&mut out, "  - {}", text)?;
        }
    }
    Ok(())
}

fn pp_skills_to(out: &mut StandardStream, skills: &BTreeMap<String, SkillCategory>) -> Result<()> {
    let found: Vec<(&String, &SkillCategory)> =
        skills.iter().filter(|(_, c)| !c.skills.is_empty()).collect();
    if found.is_empty() {
        return Ok(());
    }
    write_heading(out, "Skills")?;
    for (category, cat) in found {
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(out, "  {:<24.24}", category.replace('_', " "))?;
        out.reset()?;
        writeln!(out, "{}", cat.skills.join(", "))?;
    }
    Ok(())
}

pub fn pp_skills(skills: &BTreeMap<String, SkillCategory>) -> Result<()> {
    pp_skills_to(&mut stdout(), skills)
}

fn write_jobs(out: &mut StandardStream, jobs: &[Job]) -> Result<()> {
    for job in jobs {
        match job.match_score {
            Some(score) => write_score(out, score)?,
            None => write!(out, "{:>5}", "-")?,
        }
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(out, "  {:<40.40}", job.title)?;
        out.reset()?;
        write!(out, " {:<24.24} {:<20.20}", job.company, job.location)?;
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(out, " {}", job.id)?;
        out.reset()?;
        if !job.apply_url.is_empty() {
            out.set_color(
                ColorSpec::new()
                    .set_fg(Some(Color::Blue))
                    .set_underline(true),
            )?;
            writeln!(out, "       {}", job.apply_url)?;
            out.reset()?;
        }
    }
    Ok(())
}

pub fn pp_jobs(jobs: &[Job]) -> Result<()> {
    let mut out = stdout();
    if jobs.is_empty() {
        writeln!(&mut out, "no matching jobs")?;
        return Ok(());
    }
    write_jobs(&mut out, jobs)
}

pub fn pp_history(entries: &[HistoryEntry]) -> Result<()> {
    let mut out = stdout();
    if entries.is_empty() {
        writeln!(&mut out, "no resumes uploaded yet")?;
        return Ok(());
    }
    for entry in entries {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(&mut out, "{:<26.26}", entry.upload_date)?;
        out.reset()?;
        write!(&mut out, " {:<36.36} ", entry.filename)?;
        match entry.ats_score {
            Some(score) => write_score(&mut out, score)?,
            None => write!(&mut out, "{:>5}", "-")?,
        }
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(&mut out, "  {}", entry.resume_id)?;
        out.reset()?;
    }
    Ok(())
}

/// Prints the display blocks of a converted resume
pub fn pp_resume(sections: &[DisplaySection]) -> Result<()> {
    let mut out = stdout();
    for section in sections {
        match &section.body {
            SectionBody::Contact(header) => {
                if let Some(name) = &header.name {
                    out.set_color(ColorSpec::new().set_bold(true).set_fg(Some(Color::White)))?;
                    writeln!(&mut out, "{}", name)?;
                    out.reset()?;
                }
                for line in &header.lines {
                    let color = match line.kind {
                        ContactKind::Email => Some(Color::Green),
                        ContactKind::Link => Some(Color::Blue),
                        ContactKind::Phone => Some(Color::Yellow),
                        ContactKind::Text => None,
                    };
                    out.set_color(ColorSpec::new().set_fg(color))?;
                    writeln!(&mut out, "  {}", line.text)?;
                    out.reset()?;
                }
            }
            SectionBody::Bullets(items) => {
                write_heading(&mut out, &section.title.to_uppercase())?;
                for row in items.chunks(3) {
                    for item in row {
                        write!(&mut out, "  • {:<24.24}", item)?;
                    }
                    writeln!(&mut out)?;
                }
            }
            SectionBody::Paragraphs(paragraphs) => {
                write_heading(&mut out, &section.title.to_uppercase())?;
                for para in paragraphs {
                    if let Some(heading) = &para.heading {
                        out.set_color(ColorSpec::new().set_bold(true))?;
                        writeln!(&mut out, "  {}", heading)?;
                        out.reset()?;
                    }
                    for line in &para.lines {
                        writeln!(&mut out, "  {}", line)?;
                    }
                    writeln!(&mut out)?;
                }
            }
        }
    }
    Ok(())
}

pub fn pp_admin_stats(stats: &AdminStats) -> Result<()> {
    let mut out = stdout();
    for (label, value) in [
        ("users", stats.total_users),
        ("resumes", stats.total_resumes),
        ("ATS conversions", stats.total_ats_conversions),
        ("ATS scores", stats.total_ats_scores),
        ("skill analyses", stats.total_skill_analyses),
        ("job recommendations", stats.total_recommendations),
        ("feedback", stats.total_feedback),
    ] {
        write!(&mut out, "  {:<22}", label)?;
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(&mut out, "{:>8}", value)?;
        out.reset()?;
    }
    Ok(())
}

pub fn pp_users(users: &[UserSummary]) -> Result<()> {
    let mut out = stdout();
    for user in users {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(&mut out, "{:<26}", user.id)?;
        out.reset()?;
        write!(&mut out, " {:<24.24} {:<32.32} ", user.name, user.email)?;
        let role = user.role();
        out.set_color(ColorSpec::new().set_fg(Some(if role == resumelens::Role::Admin {
            Color::Magenta
        } else {
            Color::White
        })))?;
        write!(&mut out, "{:<6}", role)?;
        out.reset()?;
        writeln!(&mut out, " {}", user.status.as_deref().unwrap_or("active"))?;
    }
    Ok(())
}

pub fn pp_feedback_items(items: &[FeedbackItem]) -> Result<()> {
    let mut out = stdout();
    for item in items {
        let resolved = item.status.as_deref() == Some("resolved");
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(&mut out, "{:<26}", item.id)?;
        out.reset()?;
        out.set_color(ColorSpec::new().set_fg(Some(if resolved {
            Color::Green
        } else {
            Color::Yellow
        })))?;
        write!(&mut out, " {:<10}", item.status.as_deref().unwrap_or("open"))?;
        out.reset()?;
        write!(&mut out, " {:<10}", item.kind)?;
        out.set_color(ColorSpec::new().set_bold(true))?;
        writeln!(&mut out, " {}", item.subject)?;
        out.reset()?;
        if let Some(email) = &item.email {
            out.set_color(ColorSpec::new().set_dimmed(true))?;
            writeln!(&mut out, "    from {}", email)?;
            out.reset()?;
        }
        writeln!(&mut out, "    {}", item.message)?;
    }
    Ok(())
}

fn write_pagination(out: &mut StandardStream, p: &Pagination, noun: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    writeln!(
        out,
        "page {} of {} ({} {})",
        p.page,
        p.pages.max(1),
        p.total,
        noun
    )?;
    out.reset()?;
    Ok(())
}

fn write_optional_score(out: &mut StandardStream, score: Option<f64>) -> Result<()> {
    match score {
        Some(score) => write_score(out, score),
        None => {
            write!(out, "{:>5}", "-")?;
            Ok(())
        }
    }
}

fn write_id(out: &mut StandardStream, id: &str) -> Result<()> {
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(out, "{:<26}", id)?;
    out.reset()?;
    Ok(())
}

pub fn pp_admin_resumes(page: &AdminResumePage) -> Result<()> {
    let mut out = stdout();
    for resume in &page.items {
        out.set_color(ColorSpec::new().set_dimmed(true))?;
        write!(&mut out, "{:<26}", resume.id)?;
        out.reset()?;
        write!(
            &mut out,
            " {:<32.32} {:<28.28} ",
            resume.filename, resume.user_email
        )?;
        write_optional_score(&mut out, resume.ats_score)?;
        writeln!(&mut out, "  {}", resume.upload_date)?;
    }
    write_pagination(&mut out, &page.pagination, "resumes")
}

pub fn pp_ats_resumes(page: &Page<AtsResumeSummary>) -> Result<()> {
    let mut out = stdout();
    for item in &page.items {
        write_id(&mut out, &item.id)?;
        write!(&mut out, " {:<24.24} {:<32.32}", item.user_name, item.user_email)?;
        writeln!(&mut out, " {}", item.created_at)?;
    }
    write_pagination(&mut out, &page.pagination, "conversions")
}

pub fn pp_recommendation_records(page: &Page<RecommendationRecord>) -> Result<()> {
    let mut out = stdout();
    for rec in &page.items {
        write_id(&mut out, &rec.id)?;
        write!(&mut out, " {:<20.20} ", rec.user_name)?;
        write_optional_score(&mut out, rec.match_score)?;
        out.set_color(ColorSpec::new().set_bold(true))?;
        write!(&mut out, "  {:<36.36}", rec.title)?;
        out.reset()?;
        writeln!(
            &mut out,
            " {:<20.20} {}",
            rec.company,
            rec.recommended_at.as_deref().unwrap_or("")
        )?;
    }
    write_pagination(&mut out, &page.pagination, "recommendations")
}

pub fn pp_ats_score_records(page: &Page<AtsScoreRecord>) -> Result<()> {
    let mut out = stdout();
    for rec in &page.items {
        write_id(&mut out, &rec.id)?;
        write!(&mut out, " {:<24.24} ", rec.user_name)?;
        write_optional_score(&mut out, rec.overall_score)?;
        writeln!(&mut out, "  {}", rec.scored_at.as_deref().unwrap_or(""))?;
    }
    write_pagination(&mut out, &page.pagination, "scores")
}

pub fn pp_skill_analysis_records(page: &Page<SkillAnalysisRecord>) -> Result<()> {
    let mut out = stdout();
    for rec in &page.items {
        write_id(&mut out, &rec.id)?;
        write!(&mut out, " {:<24.24} ", rec.user_name)?;
        write_optional_score(&mut out, rec.match_score)?;
        match rec.total_skills {
            Some(n) => write!(&mut out, " {:>4} skills", n)?,
            None => write!(&mut out, " {:>4} skills", "-")?,
        }
        writeln!(&mut out, "  {}", rec.analyzed_at.as_deref().unwrap_or(""))?;
    }
    write_pagination(&mut out, &page.pagination, "analyses")
}

#[test]
fn test_score_color() {
    assert_eq!(score_color(92.5), Color::Green);
    assert_eq!(score_color(80.0), Color::Green);
    assert_eq!(score_color(61.0), Color::Yellow);
    assert_eq!(score_color(12.0), Color::Red);
}
