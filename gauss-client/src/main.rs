use std::error::Error;

use clap::{Parser, Subcommand};
use gauss_core::{AugmentedMatrix, Matrix, Solution};
use gauss_lsolver::algorithms::{ParallelElimination, SolveAlgorithm};
use serde::{Deserialize, Serialize};

mod report;

#[derive(Parser, Debug)]
#[command(
    name = "gauss-client",
    about = "Send a linear system to the Gauss webservice, or solve it locally"
)]
struct Cli {
    /// Base URL of the webservice
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Solve in this process with the parallel engine instead of calling the server
    #[arg(long)]
    local: bool,

    /// Worker processes for the parallel engine
    #[arg(long)]
    workers: Option<usize>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// The 3x4 test system with known solution [2, 3, -1]
    Predefined,
    /// A random system with entries in [-100, 100)
    Random {
        rows: usize,
        cols: usize,
        /// Optional random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
struct SolveRequest<'a> {
    rows: usize,
    cols: usize,
    data: &'a [f64],
    #[serde(skip_serializing_if = "Option::is_none")]
    workers: Option<usize>,
}

#[derive(Deserialize)]
struct SolveResponse {
    values: Vec<f64>,
    elapsed_ms: u128,
    workers: usize,
}

async fn solve_remote(
    server: &str,
    matrix: &AugmentedMatrix,
    workers: Option<usize>,
) -> Result<Vec<f64>, Box<dyn Error>> {
    let url = format!("{}/solve", server.trim_end_matches('/'));
    log::debug!("POST {}", url);
    let response = reqwest::Client::new()
        .post(&url)
        .json(&SolveRequest {
            rows: matrix.rows(),
            cols: matrix.cols(),
            data: matrix.data(),
            workers,
        })
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("server answered {}: {}", status, body).into());
    }
    let solved: SolveResponse = response.json().await?;
    log::info!(
        "Server solved the system in {} ms with {} worker(s)",
        solved.elapsed_ms,
        solved.workers
    );
    Ok(solved.values)
}

fn solve_local(matrix: &AugmentedMatrix, workers: Option<usize>) -> Result<Vec<f64>, Box<dyn Error>> {
    let result = ParallelElimination { worker_count: workers }.solve(matrix)?;
    log::info!(
        "Solved locally in {:?} with {} worker(s), {} rounds",
        result.metadata.elapsed,
        result.metadata.workers,
        result.metadata.rounds
    );
    Ok(result.x.into_values())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let (matrix, expected) = match cli.mode {
        Mode::Predefined => {
            println!("Selected the predefined test system.");
            let (matrix, expected) = AugmentedMatrix::predefined();
            (matrix, Some(expected))
        }
        Mode::Random { rows, cols, seed } => {
            let mut rng = match seed {
                Some(seed) => fastrand::Rng::with_seed(seed),
                None => fastrand::Rng::new(),
            };
            println!("Selected a random system.");
            (AugmentedMatrix::random(rows, cols, &mut rng)?, None)
        }
    };

    print!("{}", report::format_matrix(&matrix));
    if let Some(expected) = &expected {
        println!("{}", report::format_vector("Expected solution", expected));
    }

    let solved = if cli.local {
        solve_local(&matrix, cli.workers)?
    } else {
        solve_remote(&cli.server, &matrix, cli.workers).await?
    };
    println!("{}", report::format_vector("Solution", &solved));

    if let Some(expected) = expected {
        match Solution::new(solved).max_abs_diff(&expected) {
            Some(max_err) => println!("Maximum absolute error: {:.6}", max_err),
            None => println!("(Note) The number of unknowns differs from the expected one."),
        }
    }
    Ok(())
}
