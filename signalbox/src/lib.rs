extern crate smallvec;
extern crate ordered_float;
extern crate regex;
extern crate failure;
#[macro_use] extern crate failure_derive;

pub mod input;
pub mod output;
pub mod eventsim;
pub mod railway;
pub mod simulation;

#[cfg(test)]
mod tests;

pub use simulation::Simulation;

use std::path::Path;
pub type AppResult<T> = Result<T, failure::Error>;

pub fn read_file(f :&Path) -> AppResult<String> {
  use std::fs::File;
  use std::io::prelude::*;
  use std::io::BufReader;

  let file = File::open(f)?;
  let mut file = BufReader::new(&file);
  let mut contents = String::new();
  file.read_to_string(&mut contents)?;
  Ok(contents)
}

pub fn get_simulation(s :&Path) -> AppResult<Simulation> {
    let sim = Simulation::load_file(s)?;
    Ok(sim)
}

pub fn get_commands(s :&Path) -> AppResult<Vec<input::dispatch::Command>> {
    let contents = read_file(s)?;
    let c = input::dispatch::parse_commands(&contents)?;
    Ok(c)
}
