//! Terminal output
//!
//! tfleet prints into the normal scrollback instead of taking over the
//! screen: tables and detail views are rendered with ratatui into lines
//! inserted above a one-line inline viewport. When stdout is not a
//! terminal the same widgets are rendered off-screen and printed as text.
//!
//! - [`table`] - resource table with scope columns
//! - [`describe`] - highlighted JSON detail view

pub mod describe;
pub mod table;

use crate::resource::{FetchResult, Renderer, ResourceItem};
use anyhow::Result;
use crossterm::tty::IsTty;
use ratatui::{
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
    Terminal, TerminalOptions, Viewport,
};
use std::io::{self, Stdout};

/// Render width when stdout is not a terminal
const PLAIN_WIDTH: u16 = 160;

/// Build the advisory shown under a partial result
pub fn advisory_lines(partial_errors: &[String]) -> Vec<Line<'static>> {
    if partial_errors.is_empty() {
        return Vec::new();
    }

    let mut lines = vec![Line::from(Span::styled(
        format!(
            " ⚠ Partial results: {} fetch(es) failed",
            partial_errors.len()
        ),
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))];
    lines.extend(partial_errors.iter().map(|error| {
        Line::from(Span::styled(
            format!("   {}", error),
            Style::default().fg(Color::Yellow),
        ))
    }));
    lines
}

/// Status line under the table
pub fn summary_line(result: &FetchResult, pages: usize) -> Line<'static> {
    let more = if result.has_more() {
        format!(", more pages available ({} cursor(s))", result.page_tokens.len())
    } else {
        String::new()
    };
    Line::from(Span::styled(
        format!(
            " {} item(s), {} page(s){} - fetched {}",
            result.resources.len(),
            pages,
            more,
            result.fetched_at.format("%H:%M:%S")
        ),
        Style::default().fg(Color::DarkGray),
    ))
}

/// Where rendered blocks go
enum Output {
    /// Inserted into the scrollback above a one-line inline viewport
    Inline(Terminal<CrosstermBackend<Stdout>>),
    /// Piped output: rendered off-screen and printed as text
    Plain,
}

impl Output {
    fn open() -> Result<Self> {
        if !io::stdout().is_tty() {
            return Ok(Self::Plain);
        }
        let terminal = Terminal::with_options(
            CrosstermBackend::new(io::stdout()),
            TerminalOptions {
                viewport: Viewport::Inline(1),
            },
        )?;
        Ok(Self::Inline(terminal))
    }

    fn width(&self) -> Result<u16> {
        match self {
            Self::Inline(terminal) => Ok(terminal.size()?.width),
            Self::Plain => Ok(PLAIN_WIDTH),
        }
    }

    /// Emit `height` rows drawn by `draw`
    fn block<F>(&mut self, height: u16, draw: F) -> Result<()>
    where
        F: FnOnce(&mut Buffer),
    {
        if height == 0 {
            return Ok(());
        }
        match self {
            Self::Inline(terminal) => terminal.insert_before(height, draw)?,
            Self::Plain => {
                let mut buf = Buffer::empty(Rect::new(0, 0, PLAIN_WIDTH, height));
                draw(&mut buf);
                for line in buffer_lines(&buf) {
                    println!("{}", line);
                }
            }
        }
        Ok(())
    }

    fn lines(&mut self, lines: Vec<Line<'static>>) -> Result<()> {
        let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);
        self.block(height, |buf| {
            Paragraph::new(lines).render(buf.area, buf);
        })
    }

    /// Final status line
    fn finish(self, status: Line<'static>) -> Result<()> {
        match self {
            Self::Inline(mut terminal) => {
                terminal.draw(|f| f.render_widget(status, f.area()))?;
                println!();
            }
            Self::Plain => println!("{}", status),
        }
        Ok(())
    }
}

/// Rows of a buffer as text, trailing blanks trimmed
fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let width = usize::from(buf.area.width.max(1));
    buf.content
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|cell| cell.symbol())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

/// Print a fetch result as a table, followed by the partial-error advisory
pub fn print_table(renderer: &dyn Renderer, result: &FetchResult, pages: usize) -> Result<()> {
    let mut out = Output::open()?;

    // borders + header
    let height = u16::try_from(result.resources.len())
        .unwrap_or(u16::MAX)
        .saturating_add(3);
    let table = table::build_table(renderer, &result.resources, renderer.title());
    out.block(height, |buf| {
        Widget::render(table, buf.area, buf);
    })?;

    out.lines(advisory_lines(&result.partial_errors))?;
    out.finish(summary_line(result, pages))
}

/// Print the detail view of one item
pub fn print_detail(renderer: &dyn Renderer, item: &ResourceItem) -> Result<()> {
    let mut out = Output::open()?;
    let lines = describe::detail_lines(renderer, item);
    let width = usize::from(out.width()?.max(20));
    let height: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    let height = u16::try_from(height).unwrap_or(u16::MAX);

    out.block(height, |buf| {
        Paragraph::new(lines).wrap(Wrap { trim: false }).render(buf.area, buf);
    })?;
    out.finish(Line::from(Span::styled(
        format!(" {} {}", renderer.title(), item.id()),
        Style::default().fg(Color::DarkGray),
    )))
}

/// Print a single message line
pub fn print_message(message: &str, color: Color) -> Result<()> {
    Output::open()?.finish(Line::from(Span::styled(
        format!(" {}", message),
        Style::default().fg(color),
    )))
}
