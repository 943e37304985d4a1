mod application;
mod presentation {
    pub mod cli;
}

use ard_core::error::Result;

fn main() -> Result<()> {
    application::run()
}
