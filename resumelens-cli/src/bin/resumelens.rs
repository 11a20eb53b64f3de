use resumelens::export::{export_to_path, ExportFormat};
use resumelens::guard::post_login_destination;
use resumelens::models::{FeedbackKind, Page};
use resumelens::sections::{display_sections, ResumeDocument};
use resumelens::upload::ResumeFile;
use resumelens::{ApiClient, HttpMethod, Role, Route, Validation};
use resumelens_cli::pretty::*;
use resumelens_cli::*;
use serde::Serialize;
use serde_json::{json, Value};

use colored_json::to_colored_json_auto;
use log::{self, debug};
use anyhow::Context;
use std::io::{Read, Write};
use std::path::PathBuf;
use structopt::StructOpt;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(StructOpt)]
#[structopt(
    rename_all = "kebab-case",
    about = "CLI interface for the resumelens resume analysis service"
)]
struct Opt {
    #[structopt(
        global = true,
        long = "--host",
        env = "RESUMELENS_HOST",
        default_value = "http://localhost:5000"
    )]
    host: String,

    /// Where the login session is kept. Processes sharing this file share the session
    #[structopt(
        global = true,
        long = "--session-file",
        env = "RESUMELENS_SESSION_FILE",
        parse(from_os_str)
    )]
    session_file: Option<PathBuf>,

    /// Print raw JSON instead of formatted output
    #[structopt(global = true, long)]
    json: bool,

    /// Log more messages. Pass multiple times for ever more verbosity
    ///
    /// By default, it'll only report errors. Passing `-v` one time also prints
    /// warnings, `-vv` enables info logging, `-vvv` debug, and `-vvvv` trace.
    #[structopt(global = true, long, short = "v", parse(from_occurrences))]
    verbose: i8,

    #[structopt(long = "--shell-completions", hidden = true)]
    shell_completions: Option<structopt::clap::Shell>,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(StructOpt)]
enum JobsCommand {
    /// Jobs matching the skills in your latest resume
    Recommend {
        #[structopt(long, default_value = "10")]
        limit: u32,

        #[structopt(long, default_value = "40")]
        min_match: u32,
    },
    Search {
        query: String,

        #[structopt(long, short)]
        location: Option<String>,
    },
    /// Toggle whether a job is saved
    Save { job_id: String },
    Saved,
}

#[derive(StructOpt)]
enum AccountCommand {
    /// Change the display name and/or preferences
    Update {
        #[structopt(long, short)]
        name: Option<String>,

        /// Preferences as a JSON object, eg '{"theme": "dark"}'
        #[structopt(long)]
        preferences: Option<String>,
    },
    ChangePassword {
        #[structopt(long, env = "RESUMELENS_PASSWORD", hide_env_values = true)]
        current: String,

        #[structopt(long, env = "RESUMELENS_NEW_PASSWORD", hide_env_values = true)]
        new: String,
    },
}

#[derive(StructOpt)]
enum AdminCommand {
    Stats,
    Users,
    /// Change a user's role and/or status
    UpdateUser {
        user_id: String,

        #[structopt(long)]
        role: Option<Role>,

        #[structopt(long)]
        status: Option<String>,
    },
    DeleteUser {
        user_id: String,
    },
    Feedback,
    ResolveFeedback {
        feedback_id: String,
    },
    DeleteFeedback {
        feedback_id: String,
    },
    Resumes {
        #[structopt(long, default_value = "1")]
        page: u32,

        #[structopt(long, default_value = "20")]
        limit: u32,

        #[structopt(long, short)]
        search: Option<String>,
    },
    DeleteResume {
        resume_id: String,
    },
    /// ATS conversions made by all users
    AtsResumes {
        #[structopt(long, default_value = "1")]
        page: u32,

        #[structopt(long, default_value = "10")]
        limit: u32,

        #[structopt(long, short)]
        search: Option<String>,
    },
    DeleteAtsResume {
        id: String,
    },
    /// Job recommendations handed out across the system
    Recommendations {
        #[structopt(long, default_value = "1")]
        page: u32,

        #[structopt(long, default_value = "10")]
        limit: u32,

        #[structopt(long, short)]
        search: Option<String>,
    },
    AtsScores {
        #[structopt(long, default_value = "1")]
        page: u32,

        #[structopt(long, default_value = "10")]
        limit: u32,
    },
    SkillAnalyses {
        #[structopt(long, default_value = "1")]
        page: u32,

        #[structopt(long, default_value = "10")]
        limit: u32,
    },
}

#[derive(StructOpt)]
enum Command {
    /// Summarize configuration and session state
    Status,

    Login {
        #[structopt(long, short)]
        email: String,

        #[structopt(long, short, env = "RESUMELENS_PASSWORD", hide_env_values = true)]
        password: String,

        /// Page to continue to after logging in, eg "/analyze"
        #[structopt(long)]
        next: Option<Route>,
    },

    /// Create a new account (and log in to it)
    Register {
        #[structopt(long, short)]
        name: String,

        #[structopt(long, short)]
        email: String,

        #[structopt(long, short, env = "RESUMELENS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    Logout,

    /// Check the stored session with the server and print the account
    Whoami,

    /// Manage your own account
    Account {
        #[structopt(subcommand)]
        cmd: AccountCommand,
    },

    /// Upload a resume, then score it and match it against a job description
    Analyze {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        #[structopt(long, short)]
        job_description: Option<String>,

        /// Read the job description from a file instead
        #[structopt(long, parse(from_os_str), conflicts_with = "job-description")]
        job_description_file: Option<PathBuf>,
    },

    /// Score plain resume text without uploading a file
    AnalyzeText {
        /// Text file to read the resume from ("-" for stdin)
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        #[structopt(long, short)]
        job_description: Option<String>,
    },

    /// Convert a resume into a plain ATS-friendly layout
    Convert {
        #[structopt(parse(from_os_str))]
        file: PathBuf,

        /// Comma-separated keywords from the target job posting
        #[structopt(long, short)]
        keywords: Option<String>,

        /// Export format: txt, html, pdf or docx (default: from the output file extension)
        #[structopt(long)]
        export: Option<ExportFormat>,

        #[structopt(long, short, parse(from_os_str))]
        output: Option<PathBuf>,
    },

    /// Previously uploaded resumes
    History {
        #[structopt(long, default_value = "20")]
        limit: u32,

        #[structopt(long, default_value = "0")]
        skip: u32,
    },

    Skills {
        resume_id: String,
    },

    Jobs {
        #[structopt(subcommand)]
        cmd: JobsCommand,
    },

    /// Send feedback, a complaint, a suggestion or a bug report
    Feedback {
        #[structopt(long, short, default_value = "feedback")]
        kind: FeedbackKind,

        #[structopt(long, short)]
        subject: String,

        message: String,
    },

    /// Sub-commands for administrators
    Admin {
        #[structopt(subcommand)]
        cmd: AdminCommand,
    },

    /// Call any API endpoint. Fields are 'key==query' or 'key=body'
    Raw {
        method: HttpMethod,
        path: String,
        fields: Vec<ArgField>,
    },
}

impl Command {
    /// Page a command corresponds to, for the route guards
    fn route(&self) -> Option<Route> {
        match self {
            Command::Status
            | Command::Whoami
            | Command::Logout
            | Command::Raw { .. }
            | Command::Account { .. }
            | Command::Login { .. } => None,
            Command::Register { .. } => Some(Route::Register),
            Command::Feedback { .. } => Some(Route::Feedback),
            Command::Analyze { .. } | Command::AnalyzeText { .. } => Some(Route::Analyze),
            Command::Convert { .. } => Some(Route::Convert),
            Command::History { .. } | Command::Skills { .. } => Some(Route::History),
            Command::Jobs { .. } => Some(Route::Jobs),
            Command::Admin { cmd } => Some(match cmd {
                AdminCommand::Stats
                | AdminCommand::Recommendations { .. }
                | AdminCommand::AtsScores { .. }
                | AdminCommand::SkillAnalyses { .. } => Route::AdminDashboard,
                AdminCommand::Users
                | AdminCommand::UpdateUser { .. }
                | AdminCommand::DeleteUser { .. } => Route::AdminUsers,
                AdminCommand::Feedback
                | AdminCommand::ResolveFeedback { .. }
                | AdminCommand::DeleteFeedback { .. } => Route::AdminFeedback,
                AdminCommand::Resumes { .. }
                | AdminCommand::DeleteResume { .. }
                | AdminCommand::AtsResumes { .. }
                | AdminCommand::DeleteAtsResume { .. } => Route::AdminResumes,
            }),
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let opt = Opt::from_args();

    let log_level = match opt.verbose {
        std::i8::MIN..=-1 => "none",
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        4..=std::i8::MAX => "trace",
    };
    // hyper logging is very verbose, so crank that down even if everything else is more verbose
    let log_filter = format!("{},hyper=error", log_level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter))
        .format_timestamp(None)
        .init();

    debug!("Args parsed, starting up");

    #[cfg(windows)]
    colored_json::enable_ansi_support();

    if let Some(shell) = opt.shell_completions {
        Opt::clap().gen_completions_to("resumelens", shell, &mut std::io::stdout());
        std::process::exit(0);
    }

    if let Err(err) = run(opt) {
        // Be graceful about some errors
        if let Some(io_err) = err.root_cause().downcast_ref::<std::io::Error>() {
            if let std::io::ErrorKind::BrokenPipe = io_err.kind() {
                // presumably due to something like writing to stdout and piped to `head -n10` and
                // stdout was closed
                debug!("got BrokenPipe error, assuming stdout closed as expected and exiting with success");
                std::process::exit(0);
            }
        }
        let mut color_stderr = StandardStream::stderr(if atty::is(atty::Stream::Stderr) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        });
        color_stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        eprintln!("Error: {:#}", err);
        color_stderr.set_color(&ColorSpec::new())?;
        std::process::exit(1);
    }
    Ok(())
}

fn print_result_json<T: Serialize>(val: &T) -> Result<()> {
    writeln!(&mut std::io::stdout(), "{}", to_colored_json_auto(&serde_json::to_value(val)?)?)?;
    Ok(())
}

/// Same envelope the server uses: `{data, pagination}`
fn print_page_json<T: Serialize>(page: &Page<T>) -> Result<()> {
    print_result_json(&json!({
        "data": serde_json::to_value(&page.items)?,
        "pagination": page.pagination,
    }))
}

fn print_message(msg: &str) -> Result<()> {
    writeln!(&mut std::io::stdout(), "{}", msg)?;
    Ok(())
}

fn run(opt: Opt) -> Result<()> {
    let session = open_session(opt.session_file.as_deref())?;
    let mut client = ApiClient::new(&opt.host, session)?;

    if let Some(route) = opt.cmd.route() {
        check_route(client.session(), route)?;
    }

    match opt.cmd {
        Command::Status => {
            println!("Configuration");
            println!("  RESUMELENS_HOST: {}", opt.host);
            match &opt.session_file {
                Some(p) => println!("  RESUMELENS_SESSION_FILE: {}", p.display()),
                None => println!("  RESUMELENS_SESSION_FILE: <default>"),
            }
            println!("Session");
            if client.session().is_authenticated() {
                println!("  role: {}", client.session().current_role());
                if let Some(name) = client.session().display_name() {
                    println!("  name: {}", name);
                }
                let verdict = match client.validate_session()? {
                    Validation::Valid => "valid",
                    Validation::Invalid => "rejected by server (logged out)",
                    Validation::Unreachable => "could not check (server unreachable)",
                    Validation::NoSession => "none",
                };
                println!("  token: {}", verdict);
            } else {
                println!("  not logged in");
            }
        }
        Command::Login {
            email,
            password,
            next,
        } => {
            let session = client.login(&email, &password)?;
            let dest = post_login_destination(next, session.role);
            print_message(&format!(
                "logged in as {} ({}); continue at {}",
                session.display_name.as_deref().unwrap_or(&email),
                session.role,
                dest
            ))?;
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let session = client.register(&name, &email, &password)?;
            print_message(&format!(
                "registered and logged in as {}; continue at {}",
                name,
                Route::home_for(session.role)
            ))?;
        }
        Command::Logout => {
            client.logout()?;
            print_message("logged out")?;
        }
        Command::Whoami => match client.validate_session()? {
            Validation::NoSession => print_message("not logged in")?,
            Validation::Invalid => print_message("session was rejected by the server; logged out")?,
            Validation::Unreachable => print_message(&format!(
                "server unreachable; stored session kept (role {})",
                client.session().current_role()
            ))?,
            Validation::Valid => {
                let user = client.me()?;
                if opt.json {
                    print_result_json(&user)?;
                } else {
                    print_message(&format!(
                        "{} <{}> role={}",
                        user.name.as_deref().unwrap_or("?"),
                        user.email.as_deref().unwrap_or("?"),
                        client.session().current_role()
                    ))?;
                }
            }
        },
        Command::Account { cmd } => {
            // any role may manage its own account, but only while logged in
            if !client.session().is_authenticated() {
                return Err(anyhow::anyhow!("login required; run: resumelens login"));
            }
            match cmd {
                AccountCommand::Update { name, preferences } => {
                    let preferences = preferences
                        .map(|p| serde_json::from_str::<Value>(&p))
                        .transpose()
                        .context("--preferences should be a JSON object")?;
                    let user = client.update_account(name.as_deref(), preferences)?;
                    if opt.json {
                        print_result_json(&user)?;
                    } else {
                        print_message(&format!(
                            "profile updated: {}",
                            user.name.as_deref().unwrap_or("?")
                        ))?;
                    }
                }
                AccountCommand::ChangePassword { current, new } => {
                    print_message(&client.change_password(&current, &new)?)?
                }
            }
        }
        Command::AnalyzeText {
            file,
            job_description,
        } => {
            let text = if file.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?
            };
            let result = client.analyze_text(&text, job_description.as_deref().unwrap_or(""))?;
            if opt.json {
                print_result_json(&result)?;
            } else {
                pp_text_analysis(&result)?;
            }
        }
        Command::Analyze {
            file,
            job_description,
            job_description_file,
        } => {
            let job_description = match job_description_file {
                Some(path) => std::fs::read_to_string(path)?,
                None => job_description.unwrap_or_default(),
            };
            let resume = ResumeFile::from_path(&file)?;
            let result = client.analyze(&resume, &job_description)?;
            if opt.json {
                print_result_json(&result)?;
            } else {
                pp_analysis(&result)?;
            }
        }
        Command::Convert {
            file,
            keywords,
            export,
            output,
        } => {
            let keywords = keywords.map(|k| parse_keywords(&k)).unwrap_or_default();
            let resume = ResumeFile::from_path(&file)?;
            let converted = client.convert_ats(&resume, &keywords)?;
            match output {
                Some(path) => {
                    let format = match export {
                        Some(f) => f,
                        None => ExportFormat::from_path(&path).unwrap_or(ExportFormat::Txt),
                    };
                    export_to_path(&converted, format, &path)?;
                    print_message(&format!("wrote {} ({})", path.display(), format))?;
                }
                None if export.is_some() => {
                    return Err(anyhow::anyhow!("--export needs an --output file"));
                }
                None if opt.json => print_result_json(&converted)?,
                None => {
                    let doc = ResumeDocument::from_conversion(&converted);
                    pp_resume(&display_sections(&doc))?;
                }
            }
        }
        Command::History { limit, skip } => {
            let entries = client.history(limit, skip)?;
            if opt.json {
                print_result_json(&entries)?;
            } else {
                pp_history(&entries)?;
            }
        }
        Command::Skills { resume_id } => {
            let skills = client.skills(&resume_id)?;
            if opt.json {
                print_result_json(&skills)?;
            } else {
                pp_skills(&skills)?;
            }
        }
        Command::Jobs { cmd } => {
            let jobs = match cmd {
                JobsCommand::Recommend { limit, min_match } => {
                    client.job_recommendations(limit, min_match)?
                }
                JobsCommand::Search { query, location } => {
                    client.search_jobs(&query, location.as_deref())?
                }
                JobsCommand::Save { job_id } => {
                    let saved = client.toggle_saved_job(&job_id)?;
                    print_message(&format!(
                        "{} {}",
                        job_id,
                        if saved { "saved" } else { "removed from saved jobs" }
                    ))?;
                    return Ok(());
                }
                JobsCommand::Saved => {
                    let ids = client.saved_jobs()?;
                    if opt.json {
                        print_result_json(&ids)?;
                    } else {
                        for id in ids {
                            print_message(&id)?;
                        }
                    }
                    return Ok(());
                }
            };
            if opt.json {
                print_result_json(&jobs)?;
            } else {
                pp_jobs(&jobs)?;
            }
        }
        Command::Feedback {
            kind,
            subject,
            message,
        } => {
            let msg = client.submit_feedback(kind, &subject, &message)?;
            print_message(&msg)?;
        }
        Command::Admin { cmd } => run_admin(&mut client, cmd, opt.json)?,
        Command::Raw {
            method,
            path,
            fields,
        } => {
            let query = query_from_fields(&fields);
            let body = value_from_fields(fields);
            let result: Value = client.raw(method, &path, query, body)?;
            print_result_json(&result)?;
        }
    }
    Ok(())
}

fn run_admin(client: &mut ApiClient, cmd: AdminCommand, as_json: bool) -> Result<()> {
    match cmd {
        AdminCommand::Stats => {
            let stats = client.admin_stats()?;
            if as_json {
                print_result_json(&stats)?;
            } else {
                pp_admin_stats(&stats)?;
            }
        }
        AdminCommand::Users => {
            let users = client.admin_users()?;
            if as_json {
                print_result_json(&users)?;
            } else {
                pp_users(&users)?;
            }
        }
        AdminCommand::UpdateUser {
            user_id,
            role,
            status,
        } => print_message(&client.admin_update_user(&user_id, role, status.as_deref())?)?,
        AdminCommand::DeleteUser { user_id } => {
            print_message(&client.admin_delete_user(&user_id)?)?
        }
        AdminCommand::Feedback => {
            let items = client.admin_feedback()?;
            if as_json {
                print_result_json(&items)?;
            } else {
                pp_feedback_items(&items)?;
            }
        }
        AdminCommand::ResolveFeedback { feedback_id } => {
            print_message(&client.admin_resolve_feedback(&feedback_id)?)?
        }
        AdminCommand::DeleteFeedback { feedback_id } => {
            print_message(&client.admin_delete_feedback(&feedback_id)?)?
        }
        AdminCommand::Resumes {
            page,
            limit,
            search,
        } => {
            let result = client.admin_resumes(page, limit, search.as_deref())?;
            if as_json {
                print_page_json(&result)?;
            } else {
                pp_admin_resumes(&result)?;
            }
        }
        AdminCommand::DeleteResume { resume_id } => {
            print_message(&client.admin_delete_resume(&resume_id)?)?
        }
        AdminCommand::AtsResumes {
            page,
            limit,
            search,
        } => {
            let result = client.admin_ats_resumes(page, limit, search.as_deref())?;
            if as_json {
                print_page_json(&result)?;
            } else {
                pp_ats_resumes(&result)?;
            }
        }
        AdminCommand::DeleteAtsResume { id } => {
            print_message(&client.admin_delete_ats_resume(&id)?)?
        }
        AdminCommand::Recommendations {
            page,
            limit,
            search,
        } => {
            let result = client.admin_recommendations(page, limit, search.as_deref())?;
            if as_json {
                print_page_json(&result)?;
            } else {
                pp_recommendation_records(&result)?;
            }
        }
        AdminCommand::AtsScores { page, limit } => {
            let result = client.admin_ats_scores(page, limit)?;
            if as_json {
                print_page_json(&result)?;
            } else {
                pp_ats_score_records(&result)?;
            }
        }
        AdminCommand::SkillAnalyses { page, limit } => {
            let result = client.admin_skill_analyses(page, limit)?;
            if as_json {
                print_page_json(&result)?;
            } else {
                pp_skill_analysis_records(&result)?;
            }
        }
    }
    Ok(())
}
