//! Configuration template generation

use crate::config::Config;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

/// Generate a default configuration file at the specified path
pub fn generate_config_template<P: AsRef<Path>>(path: P) -> Result<()> {
    Config::default().save_to_file(path)
}

/// Generate a configuration file with comments explaining each field
pub fn generate_commented_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    let toml_str = r#"# chunkbroker configuration
# This is a template configuration file with all available options.
# Uncomment and modify the values as needed.

[app]
# Log level (error, warn, info, debug, trace)
log_level = "info"

[broker]
# Total capital committed to the session (quote currency)
funds = 1000.0

# Smallest tradable unit of cash; every chunk is worth exactly one min_bet
min_bet = 100.0

# Maximal lookahead for a decision, in seconds
horizon = 3600.0

# Time between two decisions, in seconds (horizon must be a multiple)
timestep = 600.0

# Discount factor applied per decision step
discount = 0.99

# Maximum tolerated probability of losing max_loss within the horizon (0-1)
risk = 0.25

# Cap on invested capital, must be a multiple of min_bet (defaults to funds)
# max_stake = 500.0

# Proportional fees (0-1) charged on buys (ask) and sells (bid)
ask_fee = 0.0
bid_fee = 0.0

# Fraction of max_stake the session tolerates losing within the horizon (0-1)
max_loss = 0.1

[engine]
# Quadrature tolerances for the expected-value integral
abs_tol = 1e-8
rel_tol = 1e-9

# Equal panels the integration domain starts with
initial_panels = 64

# Bisections allowed before the integral is reported as non-convergent
max_subdivisions = 2000

# Evaluate candidate trades in parallel
parallel = true

# What to do when no trade satisfies the risk bound: "fail" or "hold"
infeasible_policy = "fail"
"#;

    // Create parent directories if they don't exist
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, toml_str)?;
    Ok(())
}
