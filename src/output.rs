//! Colored user-facing messages for the binary.
//! Colors are enabled only when the target stream is a TTY.

use owo_colors::OwoColorize;
use std::fmt::Display;

#[derive(Clone, Copy)]
enum Stream {
    Out,
    Err,
}

fn emit(stream: Stream, tag: &str, colored: impl Display, msg: &str) {
    match stream {
        Stream::Out if atty::is(atty::Stream::Stdout) => println!("{colored} {msg}"),
        Stream::Out => println!("{tag} {msg}"),
        Stream::Err if atty::is(atty::Stream::Stderr) => eprintln!("{colored} {msg}"),
        Stream::Err => eprintln!("{tag} {msg}"),
    }
}

pub fn print_info(msg: &str) {
    emit(Stream::Out, "info:", "info:".cyan().bold(), msg);
}

pub fn print_success(msg: &str) {
    emit(Stream::Out, "ok:", "ok:".green().bold(), msg);
}

pub fn print_warn(msg: &str) {
    emit(Stream::Err, "warn:", "warn:".yellow().bold(), msg);
}

pub fn print_error(msg: &str) {
    emit(Stream::Err, "error:", "error:".red().bold(), msg);
}
