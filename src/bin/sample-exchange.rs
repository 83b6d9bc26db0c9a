use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Arg, ArgMatches, Command};
use log::debug;

use sample_exchange::api::{FileUpload, OAuthProvider, SamplePack};
use sample_exchange::error::Error;
use sample_exchange::upload::UploadPolicy;
use sample_exchange::window::{describe_remaining, GatedAction};
use sample_exchange::SampleExchange;

fn cli() -> Command<'static> {
    Command::new("sample-exchange")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Browse sample packs, upload samples and submit tracks")
        .subcommand_required(true)
        .subcommand(
            Command::new("login")
                .about("Sign in with email and password")
                .arg(Arg::new("email").required(true))
                .arg(Arg::new("password").required(true)),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account")
                .arg(Arg::new("email").required(true))
                .arg(Arg::new("password").required(true)),
        )
        .subcommand(
            Command::new("oauth")
                .about("Finish an OAuth sign-in")
                .arg(
                    Arg::new("provider")
                        .long("provider")
                        .takes_value(true)
                        .default_value("github"),
                )
                .arg(Arg::new("code").long("code").takes_value(true))
                .arg(
                    Arg::new("token")
                        .long("token")
                        .takes_value(true)
                        .conflicts_with("code"),
                ),
        )
        .subcommand(Command::new("whoami").about("Show the signed-in user"))
        .subcommand(Command::new("logout").about("Sign out and forget the token"))
        .subcommand(Command::new("packs").about("List the current and past packs"))
        .subcommand(
            Command::new("pack")
                .about("Show a pack and its window status")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("upload")
                .about("Upload a sample to a pack")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(
            Command::new("submit")
                .about("Submit a finished track")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("file").required(true))
                .arg(Arg::new("title").long("title").takes_value(true).required(true))
                .arg(
                    Arg::new("description")
                        .long("description")
                        .takes_value(true)
                        .default_value(""),
                ),
        )
        .subcommand(
            Command::new("submissions")
                .about("List submissions for a pack")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(
            Command::new("download")
                .about("Download a pack as a zip archive")
                .arg(Arg::new("id").required(true))
                .arg(Arg::new("output").required(true)),
        )
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    matches
        .value_of(name)
        .ok_or_else(|| Error::general(format!("missing argument: {}", name)))
}

fn print_window(client: &SampleExchange, pack: &SamplePack, action: GatedAction) {
    let now = Utc::now();
    let report = client.uploader().gate(pack, action, now);
    let mut line = format!("  {} is {}", action.window_name(), report.status.message());
    if let Some(remaining) = report.remaining {
        line.push_str(&format!(", closes in {}", describe_remaining(remaining)));
    }
    println!("{}", line);
    if let Some(diagnostic) = report.diagnostic {
        println!("  ({})", diagnostic);
    }
}

async fn require_session(client: &SampleExchange) -> Result<(), Error> {
    if let Err(err) = client.session().restore().await {
        debug!("restore failed: {}", err);
    }
    if !client.session().is_authenticated() {
        return Err(Error::general("not signed in; run `sample-exchange login` first"));
    }
    Ok(())
}

async fn run(matches: ArgMatches) -> Result<(), Error> {
    let client = SampleExchange::from_env()?;

    match matches.subcommand() {
        Some(("login", sub)) => {
            let user = client.session().login(arg(sub, "email")?, arg(sub, "password")?).await?;
            println!("Signed in as {}", user.email);
        }
        Some(("register", sub)) => {
            client
                .session()
                .register(arg(sub, "email")?, arg(sub, "password")?)
                .await?;
            println!("Account created. Check your inbox, then sign in.");
        }
        Some(("oauth", sub)) => {
            let user = match sub.value_of("token") {
                Some(token) => client.session().sign_in_with_token(token).await?,
                None => {
                    let provider: OAuthProvider = arg(sub, "provider")?.parse()?;
                    client
                        .session()
                        .exchange_oauth_code(arg(sub, "code")?, provider)
                        .await?
                }
            };
            println!("Signed in as {}", user.email);
        }
        Some(("whoami", _)) => {
            require_session(&client).await?;
            if let Some(user) = client.session().user() {
                println!("{} (id {})", user.email, user.id);
            }
        }
        Some(("logout", _)) => {
            client.session().logout();
            println!("Signed out");
        }
        Some(("packs", _)) => {
            require_session(&client).await?;
            let listing = client.list_packs().await?;
            match &listing.current_pack {
                Some(pack) => {
                    println!("Current: [{}] {}", pack.id, pack.title);
                    print_window(&client, pack, GatedAction::UploadSample);
                    print_window(&client, pack, GatedAction::SubmitTrack);
                }
                None => println!("No pack is running"),
            }
            for pack in &listing.past_packs {
                println!("Past:    [{}] {} ({})", pack.id, pack.title, pack.start_date);
            }
        }
        Some(("pack", sub)) => {
            require_session(&client).await?;
            let pack = client.get_pack(arg(sub, "id")?).await?;
            println!("[{}] {}", pack.id, pack.title);
            if !pack.description.is_empty() {
                println!("{}", pack.description);
            }
            print_window(&client, &pack, GatedAction::UploadSample);
            print_window(&client, &pack, GatedAction::SubmitTrack);
            if let Some(user) = client.session().user() {
                let remaining = UploadPolicy::default().remaining_uploads(&pack, &user);
                println!("  You have {} uploads remaining", remaining);
            }
            for sample in &pack.samples {
                println!("  - {}", sample.filename);
            }
        }
        Some(("upload", sub)) => {
            require_session(&client).await?;
            let pack = client.get_pack(arg(sub, "id")?).await?;
            let file = FileUpload::from_path(PathBuf::from(arg(sub, "file")?)).await?;
            let sample = client.uploader().upload_sample(&pack, file, Utc::now()).await?;
            println!("Successfully uploaded {}", sample.filename);
        }
        Some(("submit", sub)) => {
            require_session(&client).await?;
            let pack = client.get_pack(arg(sub, "id")?).await?;
            let file = FileUpload::from_path(PathBuf::from(arg(sub, "file")?)).await?;
            let submission = client
                .uploader()
                .submit_track(&pack, arg(sub, "title")?, arg(sub, "description")?, file, Utc::now())
                .await?;
            println!("Submitted \"{}\"", submission.title);
        }
        Some(("submissions", sub)) => {
            require_session(&client).await?;
            for submission in client.list_submissions(arg(sub, "id")?).await? {
                let author = submission.user.map(|u| u.email).unwrap_or_default();
                println!("[{}] {} {}", submission.id, submission.title, author);
            }
        }
        Some(("download", sub)) => {
            require_session(&client).await?;
            let bytes = client.download_pack(arg(sub, "id")?).await?;
            let output = PathBuf::from(arg(sub, "output")?);
            tokio::fs::write(&output, &bytes).await?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
        }
        _ => unreachable!("subcommand_required"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    match run(cli().get_matches()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
