use std::env;
use std::path::PathBuf;

use actix_files::Files;
use actix_web::{App, HttpServer, web};
use ayto_odds::controller::Board;
use ayto_odds::source::Source;
use ayto_odds::www;
use clap::Parser;

/// Serves the weekly matchup probability board.
#[derive(Parser)]
struct Cli {
    /// Local directory with data_week_<k>.json files. Defaults to the
    /// current directory.
    #[clap(long, conflicts_with = "base_url")]
    data_dir: Option<PathBuf>,
    /// Base URL serving the week files over HTTP instead.
    #[clap(long)]
    base_url: Option<String>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = Cli::parse();
    let source = match (&args.data_dir, &args.base_url) {
        (_, Some(base)) => Source::http(base),
        (Some(dir), None) => Source::dir(dir),
        (None, None) => Source::dir("."),
    };
    let source = match source {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = www::handlers::template::verify_mounts() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    let files_dir = match &source {
        Source::Dir(dir) => Some(dir.clone()),
        Source::Http(_) => None,
    };

    let data = web::Data::new(Board::new(source));
    match data.boot().await {
        Ok(weeks) => eprintln!("Loaded {} week(s)", weeks.len()),
        Err(e) => {
            eprintln!("Failed to load season data: {:#}", e);
            std::process::exit(1);
        }
    }

    let server_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| String::from("0.0.0.0"));
    let server_port = env::var("PORT").unwrap_or_else(|_| String::from("8080"));
    let bind_address = format!("{}:{}", server_address, server_port);

    eprintln!("Starting server at: http://{}/", bind_address);
    HttpServer::new(move || {
        let mut app = App::new()
            .app_data(data.clone())
            .route("/", web::get().to(www::handlers::index))
            .route("/week/{week}", web::get().to(www::handlers::week::show))
            .route("/svg/{week}", web::get().to(www::handlers::week::svg))
            .route("/api/weeks", web::get().to(www::handlers::api::weeks))
            .route("/api/week/{week}", web::get().to(www::handlers::api::week))
            .route("/api/relayout", web::get().to(www::handlers::api::relayout));
        if let Some(dir) = &files_dir {
            app = app.service(Files::new("/data", dir.clone()));
        }
        app
    })
    .bind(bind_address)?
    .run()
    .await
}
