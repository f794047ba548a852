//! Resolution of annotation labels that are missing from the class map.

use anyhow::{bail, Result};
use clap::ValueEnum;
use log::info;
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::project::ClassMap;

/// Decision for one unknown label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Map the label onto an existing class index
    Reuse(usize),
    /// Append the label itself as a new class
    AddNew,
    /// Append (or reuse) a class with a different name and map the label onto it
    Rename(String),
    /// Drop every box carrying this label
    Discard,
}

pub trait LabelResolver {
    fn resolve_unknown_label(&mut self, label: &str, classes: &[String]) -> Result<Resolution>;
}

/// How unknown labels are handled when no operator is at the console
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum UnknownLabelPolicy {
    /// Ask on the console
    Prompt,
    /// Add every unknown label as a new class
    Add,
    /// Discard boxes with unknown labels
    Discard,
}

impl UnknownLabelPolicy {
    pub fn resolver(self) -> Box<dyn LabelResolver> {
        match self {
            UnknownLabelPolicy::Prompt => Box::new(ConsoleResolver::stdio()),
            UnknownLabelPolicy::Add => Box::new(ScriptedResolver::always(Resolution::AddNew)),
            UnknownLabelPolicy::Discard => Box::new(ScriptedResolver::always(Resolution::Discard)),
        }
    }
}

/// Apply `resolution` for `label` to the class map and return the mapped index
pub fn apply_resolution(
    class_map: &mut ClassMap,
    label: &str,
    resolution: &Resolution,
) -> Result<i64> {
    let index = match resolution {
        Resolution::Reuse(index) => {
            if *index >= class_map.classes().len() {
                bail!(
                    "cannot map label '{}' to class index {}: only {} classes",
                    label,
                    index,
                    class_map.classes().len()
                );
            }
            *index as i64
        }
        Resolution::AddNew => class_map.add_class(label),
        Resolution::Rename(name) => {
            let index = class_map.add_class(name);
            class_map.map_label(name, index);
            index
        }
        Resolution::Discard => -1,
    };
    info!("Updating classes_dict: {} : {}", label, index);
    class_map.map_label(label, index);
    Ok(index)
}

/// Pre-recorded answers, falling back to a fixed decision once exhausted
#[derive(Debug, Clone)]
pub struct ScriptedResolver {
    answers: VecDeque<Resolution>,
    fallback: Option<Resolution>,
    asked: Vec<String>,
}

impl ScriptedResolver {
    pub fn new<I: IntoIterator<Item = Resolution>>(answers: I) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback: None,
            asked: Vec::new(),
        }
    }

    pub fn always(resolution: Resolution) -> Self {
        Self {
            answers: VecDeque::new(),
            fallback: Some(resolution),
            asked: Vec::new(),
        }
    }

    /// Labels this resolver was asked about, in order
    pub fn asked(&self) -> &[String] {
        &self.asked
    }
}

impl LabelResolver for ScriptedResolver {
    fn resolve_unknown_label(&mut self, label: &str, _classes: &[String]) -> Result<Resolution> {
        self.asked.push(label.to_string());
        match self.answers.pop_front().or_else(|| self.fallback.clone()) {
            Some(resolution) => Ok(resolution),
            None => bail!("no scripted resolution left for label '{}'", label),
        }
    }
}

/// Numbered console menu. Invalid selections are re-prompted until a valid one
/// arrives; end of input is an error.
pub struct ConsoleResolver<R, W> {
    input: R,
    output: W,
}

impl ConsoleResolver<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn read_line(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input closed while waiting for a selection");
        }
        Ok(line.trim().to_string())
    }

    fn read_new_label(&mut self) -> Result<String> {
        loop {
            let name = self.read_line("Enter a label name: ")?;
            if name.is_empty() {
                writeln!(self.output, "Invalid input. Please try again")?;
            } else {
                return Ok(name);
            }
        }
    }
}

impl<R: BufRead, W: Write> LabelResolver for ConsoleResolver<R, W> {
    fn resolve_unknown_label(&mut self, label: &str, classes: &[String]) -> Result<Resolution> {
        let mut options: Vec<&str> = classes.iter().map(|class| class.as_str()).collect();
        options.extend(["Add New Label", "Rename And Add", "Remove"]);

        writeln!(self.output)?;
        writeln!(self.output, "******")?;
        writeln!(self.output, "Unable to find label: {}", label)?;
        writeln!(self.output, "Choose option from list to proceed")?;
        let choice = select_option(&mut self.input, &mut self.output, &options)?;

        let resolution = if choice < classes.len() {
            Resolution::Reuse(choice)
        } else if choice == classes.len() {
            Resolution::AddNew
        } else if choice == classes.len() + 1 {
            Resolution::Rename(self.read_new_label()?)
        } else {
            Resolution::Discard
        };
        Ok(resolution)
    }
}

/// Print `options` as a 1-based menu and return the chosen 0-based index
pub fn select_option<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    options: &[&str],
) -> Result<usize> {
    for (i, option) in options.iter().enumerate() {
        writeln!(output, "{}. {}", i + 1, option)?;
    }
    loop {
        write!(output, "\nEnter your choice: ")?;
        output.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            bail!("input closed while waiting for a selection");
        }
        match line.trim().parse::<usize>() {
            Ok(choice) if (1..=options.len()).contains(&choice) => return Ok(choice - 1),
            Ok(_) => writeln!(output, "Invalid choice. Please enter a valid number.")?,
            Err(_) => writeln!(output, "Invalid input. Please enter a number.")?,
        }
    }
}
