//! Strategies for resolving negotiation rounds.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::{Mutex, PoisonError};

use tracing::warn;

use crate::api::{DataResponseItem, Info};
use crate::config::METHOD_ORDER;

/// Resolves the archive's requests for a choice, missing information, or an
/// alternative method. Returning `None` declines, which fails that provider
/// group with the matching error.
pub trait Negotiator: Send + Sync {
    /// Status 300: pick delivery methods from `choices`.
    fn multiple_choices(&self, choices: &[String], item: &DataResponseItem) -> Option<Vec<String>>;

    /// Status 412: supply a value for `field`. It is merged into the request
    /// info under `field`.
    fn missing_information(&self, info: &Info, field: &str) -> Option<String>;

    /// Status 405: propose different methods.
    fn unknown_method(&self, item: &DataResponseItem) -> Option<Vec<String>>;
}

/// Picks the first offered method in a fixed preference order and declines
/// everything else.
#[derive(Debug, Clone)]
pub struct DefaultNegotiator {
    method_order: Vec<String>,
}

impl DefaultNegotiator {
    pub fn new(method_order: Vec<String>) -> Self { Self { method_order } }
}

impl Default for DefaultNegotiator {
    fn default() -> Self { Self::new(METHOD_ORDER.iter().map(ToString::to_string).collect()) }
}

impl Negotiator for DefaultNegotiator {
    fn multiple_choices(&self, choices: &[String], _: &DataResponseItem) -> Option<Vec<String>> {
        self.method_order
            .iter()
            .find(|method| choices.contains(method))
            .map(|method| vec![method.clone()])
    }

    fn missing_information(&self, _: &Info, _: &str) -> Option<String> { None }

    fn unknown_method(&self, _: &DataResponseItem) -> Option<Vec<String>> { None }
}

/// Declines every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Declining;

impl Negotiator for Declining {
    fn multiple_choices(&self, _: &[String], _: &DataResponseItem) -> Option<Vec<String>> { None }

    fn missing_information(&self, _: &Info, _: &str) -> Option<String> { None }

    fn unknown_method(&self, _: &DataResponseItem) -> Option<Vec<String>> { None }
}

/// Asks a person. Reads answers line by line from `R` and writes prompts to
/// `W`; an empty answer, `0` or end of input declines.
///
/// Prompts block the calling thread while waiting for input.
pub struct InteractiveNegotiator<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> InteractiveNegotiator<R, W> {
    pub fn new(input: R, output: W) -> Self { Self { io: Mutex::new((input, output)) } }

    fn ask(&self, prompt: &str) -> io::Result<Option<String>> {
        let mut io = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let (input, output) = &mut *io;
        write!(output, "{prompt}")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn choose(&self, choices: &[String]) -> io::Result<Option<String>> {
        let mut menu = String::new();
        for (n, choice) in choices.iter().enumerate() {
            menu.push_str(&format!("({}) {choice}\n", n + 1));
        }
        menu.push_str("Method number: ");
        loop {
            let Some(answer) = self.ask(&menu)? else {
                return Ok(None);
            };
            if answer.is_empty() {
                return Ok(None);
            }
            match answer.parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(n) if n <= choices.len() => return Ok(Some(choices[n - 1].clone())),
                _ => continue,
            }
        }
    }
}

impl InteractiveNegotiator<BufReader<Stdin>, Stdout> {
    /// Prompt on the terminal.
    pub fn stdio() -> Self { Self::new(BufReader::new(io::stdin()), io::stdout()) }
}

impl<R, W> Negotiator for InteractiveNegotiator<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn multiple_choices(&self, choices: &[String], _: &DataResponseItem) -> Option<Vec<String>> {
        match self.choose(choices) {
            Ok(choice) => choice.map(|c| vec![c]),
            Err(err) => {
                warn!(%err, "prompt failed, declining");
                None
            }
        }
    }

    fn missing_information(&self, _: &Info, field: &str) -> Option<String> {
        match self.ask(&format!("{field}: ")) {
            Ok(answer) => answer.filter(|a| !a.is_empty()),
            Err(err) => {
                warn!(%err, "prompt failed, declining");
                None
            }
        }
    }

    fn unknown_method(&self, _: &DataResponseItem) -> Option<Vec<String>> { None }
}
