//! The scrollable document the chat widget lives in.
//!
//! The page is laid out top to bottom as Intro, Demo (the transcript) and
//! Details. Rendering reports where each section starts; navigation
//! shortcuts then ease the viewport toward that line one tick at a time.

use unicode_width::UnicodeWidthChar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Intro,
    Demo,
    Details,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Intro, Section::Demo, Section::Details];

    fn index(self) -> usize {
        match self {
            Section::Intro => 0,
            Section::Demo => 1,
            Section::Details => 2,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Section::Intro => "SteuerPilot",
            Section::Demo => "Demo",
            Section::Details => "Details",
        }
    }
}

pub const INTRO: &[&str] = &[
    "A preparation assistant for your German income tax return. Tell it about \
     your job, household and expenses; it keeps track of what you have, which \
     deductions might apply, and which documents are still missing.",
    "SteuerPilot never files anything, never touches ELSTER and is not a tax \
     advisor. It helps you get ready.",
];

pub const DETAILS: &[&str] = &[
    "Intake: collects profile essentials one or two questions at a time and \
     never asks for credentials, tax IDs or banking logins.",
    "Deduction scout: walks the deduction catalog, asks about the categories \
     that are still open and records expenses you mention.",
    "Document checklist: turns what it learned into a personalized list of \
     receipts and certificates to gather.",
    "Summary: recaps the case and lists what to verify before you file.",
    "The backend needs GOOGLE_API_KEY set. Conversations live only as long as \
     the server session; nothing is stored by this client.",
];

/// First line of every section plus the line just past the transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionMap {
    starts: [u16; 3],
    demo_end: u16,
}

impl SectionMap {
    pub fn new(intro: u16, demo: u16, details: u16, demo_end: u16) -> Self {
        Self {
            starts: [intro, demo, details],
            demo_end,
        }
    }

    pub fn start(&self, section: Section) -> u16 {
        self.starts[section.index()]
    }

    pub fn demo_end(&self) -> u16 {
        self.demo_end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Section(Section),
    DemoTail,
}

#[derive(Debug, Default)]
pub struct Page {
    offset: u16,
    target: u16,
    anchor: Option<Anchor>,
    viewport_height: u16,
    content_height: u16,
    sections: SectionMap,
}

impl Page {
    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn is_animating(&self) -> bool {
        self.offset != self.target
    }

    fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    /// Smoothly bring `section` to the top of the viewport.
    pub fn scroll_to(&mut self, section: Section) {
        self.anchor = Some(Anchor::Section(section));
        self.resolve_anchor();
    }

    /// Smoothly bring the newest bubble into view.
    pub fn follow_tail(&mut self) {
        self.anchor = Some(Anchor::DemoTail);
        self.resolve_anchor();
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let next = (i32::from(self.offset) + delta).clamp(0, i32::from(self.max_offset()));
        self.jump(next as u16);
    }

    pub fn scroll_half_page(&mut self, down: bool) {
        let half = i32::from((self.viewport_height / 2).max(1));
        self.scroll_by(if down { half } else { -half });
    }

    pub fn scroll_to_top(&mut self) {
        self.jump(0);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.jump(self.max_offset());
    }

    fn jump(&mut self, offset: u16) {
        self.anchor = None;
        self.offset = offset;
        self.target = offset;
    }

    /// Record the geometry of the last render. Anchored scrolls are
    /// re-targeted so they survive resizes and new content.
    pub fn set_layout(&mut self, viewport_height: u16, content_height: u16, sections: SectionMap) {
        self.viewport_height = viewport_height;
        self.content_height = content_height;
        self.sections = sections;

        let max = self.max_offset();
        self.offset = self.offset.min(max);
        self.target = self.target.min(max);
        self.resolve_anchor();
    }

    fn resolve_anchor(&mut self) {
        let Some(anchor) = self.anchor else {
            return;
        };
        let line = match anchor {
            Anchor::Section(section) => self.sections.start(section),
            Anchor::DemoTail => self
                .sections
                .demo_end()
                .saturating_sub(self.viewport_height),
        };
        self.target = line.min(self.max_offset());
    }

    /// Advance the scroll animation by one frame: cover half the remaining
    /// distance, at least one line. Returns whether anything moved.
    pub fn tick(&mut self) -> bool {
        if self.offset == self.target {
            return false;
        }
        let step = self.target.abs_diff(self.offset).div_ceil(2);
        if self.target > self.offset {
            self.offset += step;
        } else {
            self.offset -= step;
        }
        true
    }
}

/// Word-wrap `text` to `width` display columns. Words wider than a line are
/// split; explicit newlines are kept and blank lines survive as empty strings.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    wrap_styled(&[((), text)], width)
        .into_iter()
        .map(|line| line.into_iter().map(|(_, segment)| segment).collect())
        .collect()
}

/// Word-wrap a run of styled text. A word may straddle runs and a style may
/// straddle lines; each output line is a list of same-style segments.
pub fn wrap_styled<S: Copy + PartialEq>(runs: &[(S, &str)], width: usize) -> Vec<Vec<(S, String)>> {
    let mut wrapper = Wrapper {
        width: width.max(1),
        lines: Vec::new(),
        current: Vec::new(),
        current_width: 0,
        word: Vec::new(),
        gap: None,
    };

    for &(style, text) in runs {
        for c in text.chars() {
            if c == '\n' {
                wrapper.flush_word();
                wrapper.break_line();
                wrapper.gap = None;
            } else if c.is_whitespace() {
                wrapper.flush_word();
                if wrapper.current_width > 0 && wrapper.gap.is_none() {
                    wrapper.gap = Some(style);
                }
            } else {
                wrapper.word.push((style, c));
            }
        }
    }
    wrapper.flush_word();
    wrapper.break_line();

    wrapper.lines
}

fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).unwrap_or(0)
}

struct Wrapper<S> {
    width: usize,
    lines: Vec<Vec<(S, String)>>,
    current: Vec<(S, String)>,
    current_width: usize,
    word: Vec<(S, char)>,
    // Style of the whitespace between the line so far and the next word.
    gap: Option<S>,
}

impl<S: Copy + PartialEq> Wrapper<S> {
    fn break_line(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.current_width = 0;
    }

    fn push_char(&mut self, style: S, c: char) {
        if let Some((last, segment)) = self.current.last_mut() {
            if *last == style {
                segment.push(c);
                return;
            }
        }
        self.current.push((style, c.to_string()));
    }

    fn flush_word(&mut self) {
        let mut word = std::mem::take(&mut self.word);
        if word.is_empty() {
            return;
        }
        let gap = self.gap.take();
        let mut word_width: usize = word.iter().map(|&(_, c)| char_width(c)).sum();

        if self.current_width > 0 && self.current_width + 1 + word_width > self.width {
            self.break_line();
        }

        while word_width > self.width {
            if self.current_width > 0 {
                self.break_line();
            }
            // At least one char per line, even one wider than the line.
            let mut taken = 0;
            let mut taken_width = 0;
            for &(_, c) in &word {
                let w = char_width(c);
                if taken > 0 && taken_width + w > self.width {
                    break;
                }
                taken += 1;
                taken_width += w;
            }
            if taken == word.len() {
                break;
            }
            let rest = word.split_off(taken);
            for (style, c) in word {
                self.push_char(style, c);
            }
            self.break_line();
            word = rest;
            word_width -= taken_width;
        }

        if self.current_width > 0 {
            let style = gap.unwrap_or(word[0].0);
            self.push_char(style, ' ');
            self.current_width += 1;
        }
        for (style, c) in word {
            self.push_char(style, c);
        }
        self.current_width += word_width;
    }
}
