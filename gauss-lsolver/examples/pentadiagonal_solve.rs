use gauss_lsolver::{
    algorithms::{ParallelElimination, SequentialElimination, SolveAlgorithm},
    AugmentedMatrix, SOLUTION_TOLERANCE,
};

/// Creates a dense pentadiagonal system `[A | b]` of size n x (n + 1).
/// Diagonals:
/// - Main: 4.0
/// - Adjacent (+1, -1): -1.0
/// - Outer (+2, -2): -0.5
///
/// and b[i] = sin(i / n).
fn create_pentadiagonal_system(n: usize) -> AugmentedMatrix {
    let width = n + 1;
    let mut data = vec![0.0; n * width];

    for i in 0..n {
        let row = &mut data[i * width..(i + 1) * width];
        if i >= 2 {
            row[i - 2] = -0.5;
        }
        if i >= 1 {
            row[i - 1] = -1.0;
        }
        row[i] = 4.0;
        if i + 1 < n {
            row[i + 1] = -1.0;
        }
        if i + 2 < n {
            row[i + 2] = -0.5;
        }
        row[n] = (i as f64 / n as f64).sin();
    }

    AugmentedMatrix::new(n, width, data).expect("Failed to create augmented system")
}

fn main() {
    // Initialize logging based on RUST_LOG environment variable
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let n = 500;
    log::info!("Setting up {}x{} pentadiagonal system...", n, n + 1);
    let system = create_pentadiagonal_system(n);

    let sequential = match SequentialElimination::new().solve(&system) {
        Ok(result) => result,
        Err(e) => {
            log::error!("Sequential solver failed: {:?}", e);
            return;
        }
    };
    log::info!("Sequential: {:?}", sequential.metadata.elapsed);

    let algorithm = ParallelElimination::new();
    log::info!("Running parallel solver with {} workers...", algorithm.process_budget(n));
    match algorithm.solve(&system) {
        Ok(result) => {
            log::info!("Parallel solver finished successfully!");
            log::info!("  Workers: {}", result.metadata.workers);
            log::info!("  Rounds: {}", result.metadata.rounds);
            log::info!("  Tasks dispatched: {}", result.metadata.tasks_dispatched);
            log::info!("  Time elapsed: {:?}", result.metadata.elapsed);
            match result.x.max_abs_diff(sequential.x.values()) {
                Some(delta) if delta <= SOLUTION_TOLERANCE => {
                    log::info!("  Matches sequential solution (max delta = {:.3e})", delta)
                }
                Some(delta) => log::warn!("  Diverges from sequential solution (max delta = {:.3e})", delta),
                None => log::warn!("  Solution lengths differ"),
            }
        }
        Err(e) => {
            log::error!("Parallel solver failed: {:?}", e);
        }
    }
}
