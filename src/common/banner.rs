const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

macro_rules! env_or {
    ($key:literal, $default:literal) => {
        option_env!($key).unwrap_or($default)
    };
}

pub struct BannerInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit_short: &'static str,
    pub profile: &'static str,
}

impl Default for BannerInfo {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            branch: env_or!("GIT_BRANCH", "unknown"),
            commit_short: env_or!("GIT_COMMIT_SHORT", "unknown"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }
}

pub fn print_banner(info: &BannerInfo) {
    println!();
    println!("{GREEN}    ____  ___           ____    _       __  {RESET}");
    println!("{GREEN}   / __ )/ (_)___  ____/ / /   (_)___  / /__{RESET}");
    println!("{GREEN}  / __  / / / __ \\/ __  / /   / / __ \\/ //_/{RESET}");
    println!("{GREEN} / /_/ / / / / / / /_/ / /___/ / / / / ,<   {RESET}");
    println!("{GREEN}/_____/_/_/_/ /_/\\__,_/_____/_/_/ /_/_/|_|  {RESET}");
    println!("{DIM}============================================{RESET}");
    println!();

    print_row("Version", info.version, CYAN);
    print_row("Branch", info.branch, RESET);
    print_row("Commit", info.commit_short, RESET);
    print_row("Profile", info.profile, YELLOW);

    println!();
}

fn print_row(label: &str, value: &str, color: &str) {
    println!("  {DIM}{: <10}{RESET} {color}{}{RESET}", label, value);
}
