use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::app::{App, NoticeLevel};
use crate::audio::output::AudioOutput;
use crate::scheduler::Clock;
use crate::session::POOL_SIZE;

const HORIZONTAL_MARGIN: u16 = 2;
const COLUMN_LETTERS: &[u8; 5] = b"BINGO";
const NUMBERS_PER_LETTER: usize = POOL_SIZE / 5;
const RECENT_CALLS: usize = 10;

/// Letter of the card column a number belongs to (B 1-15 ... O 61-75).
pub fn column_letter(number: u8) -> char {
    let idx = (number.saturating_sub(1) as usize / NUMBERS_PER_LETTER).min(4);
    COLUMN_LETTERS[idx] as char
}

pub fn call_label(number: u8) -> String {
    format!("{}-{}", column_letter(number), number)
}

fn secs(ms: u64) -> String {
    format!("{:.1}s", ms as f64 / 1000.0)
}

impl<C: Clock, O: AudioOutput> Widget for &App<C, O> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(1), // title
                    Constraint::Length(5), // current number
                    Constraint::Length(7), // board
                    Constraint::Length(1), // recent calls
                    Constraint::Length(1), // timing
                    Constraint::Min(1),    // notice
                    Constraint::Length(1), // legend
                ]
                .as_ref(),
            )
            .split(area);

        Paragraph::new(Line::from(vec![
            Span::styled("TOMBOLA", bold.fg(Color::Magenta)),
            Span::styled(
                format!("  {}/{} called", self.session.drawn_count(), POOL_SIZE),
                dim,
            ),
        ]))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        render_current(self, chunks[1], buf);
        render_board(self, chunks[2], buf);

        let recent = self
            .board
            .called
            .iter()
            .rev()
            .take(RECENT_CALLS)
            .map(|&n| call_label(n))
            .join("  ");
        Paragraph::new(Line::from(vec![
            Span::styled("last: ", dim),
            Span::raw(if recent.is_empty() { "-".to_string() } else { recent }),
        ]))
        .render(chunks[3], buf);

        let timing = self.timing();
        let first = if timing.use_first_override {
            format!("first draw {}", secs(timing.first_duration_ms))
        } else {
            "first draw override off".to_string()
        };
        Paragraph::new(Span::styled(
            format!("draw {}  |  {}", secs(timing.default_duration_ms), first),
            dim,
        ))
        .render(chunks[4], buf);

        if let Some(notice) = &self.notice {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Warn => Color::Yellow,
                NoticeLevel::Error => Color::Red,
            };
            Paragraph::new(Span::styled(notice.text.clone(), bold.fg(color)))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[5], buf);
        }

        Paragraph::new(Span::styled(
            "(space) draw  (n)ew game  (+/-) duration  (f)irst-draw override  (q)uit",
            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[6], buf);
    }
}

fn render_current<C: Clock, O: AudioOutput>(app: &App<C, O>, area: Rect, buf: &mut Buffer) {
    let board = &app.board;
    let (text, style) = match board.current {
        Some(n) if board.is_rolling() => (
            call_label(n),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Some(n) => (
            call_label(n),
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        None if board.trigger_enabled => (
            "press space to draw".to_string(),
            Style::default().add_modifier(Modifier::DIM),
        ),
        None => ("-".to_string(), Style::default().add_modifier(Modifier::DIM)),
    };

    Paragraph::new(vec![Line::raw(""), Line::styled(text, style)])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
        .render(area, buf);
}

fn render_board<C: Clock, O: AudioOutput>(app: &App<C, O>, area: Rect, buf: &mut Buffer) {
    let board = &app.board;
    let latest = board.called.last().copied();
    let called_style = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let latest_style = called_style.add_modifier(Modifier::REVERSED);
    let open_style = Style::default().add_modifier(Modifier::DIM);

    let rows: Vec<Line> = (1..=POOL_SIZE as u8)
        .chunks(NUMBERS_PER_LETTER)
        .into_iter()
        .map(|row| {
            let mut spans = Vec::with_capacity(NUMBERS_PER_LETTER + 1);
            let mut first = None;
            for n in row {
                if first.is_none() {
                    first = Some(n);
                    spans.push(Span::styled(format!("{} ", column_letter(n)), Style::default()));
                }
                let style = if Some(n) == latest {
                    latest_style
                } else if board.is_called(n) {
                    called_style
                } else {
                    open_style
                };
                spans.push(Span::styled(format!("{n:>3}"), style));
            }
            Line::from(spans)
        })
        .collect();

    Paragraph::new(rows)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::default_cue_specs;
    use crate::audio::mixer::Mixer;
    use crate::audio::source::BuiltinSource;
    use crate::config::Config;
    use crate::scheduler::ManualClock;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn screen_text(app: &App<ManualClock, Mixer>) -> String {
        let backend = TestBackend::new(90, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|f| f.render_widget(app, f.area()))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .join("\n")
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(1), 'B');
        assert_eq!(column_letter(15), 'B');
        assert_eq!(column_letter(16), 'I');
        assert_eq!(column_letter(45), 'N');
        assert_eq!(column_letter(46), 'G');
        assert_eq!(column_letter(75), 'O');
        assert_eq!(call_label(42), "N-42");
    }

    #[test]
    fn renders_idle_screen() {
        let mut app = App::new(Config::default(), ManualClock::new(), Mixer::new(8_000));
        app.preload(&default_cue_specs(), &BuiltinSource).unwrap();
        let text = screen_text(&app);
        assert!(text.contains("TOMBOLA"));
        assert!(text.contains("0/75 called"));
        assert!(text.contains("press space to draw"));
        assert!(text.contains("first draw 2.0s"));
    }

    #[test]
    fn renders_called_number_after_draw() {
        let clock = ManualClock::new();
        let mut app = App::new(Config::default(), clock.clone(), Mixer::new(8_000));
        app.preload(&default_cue_specs(), &BuiltinSource).unwrap();
        app.request_draw();
        clock.advance(Duration::from_secs(10));
        app.on_tick();

        let n = app.session.history()[0];
        let text = screen_text(&app);
        assert!(text.contains("1/75 called"));
        assert!(text.contains(&format!("last: {}", call_label(n))));
    }

    #[test]
    fn renders_notice() {
        let mut app = App::new(Config::default(), ManualClock::new(), Mixer::new(8_000));
        app.request_draw();
        let text = screen_text(&app);
        assert!(text.contains("sound cues are not loaded yet"));
    }
}
