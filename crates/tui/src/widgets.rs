//! Small stateful building blocks shared by the screens.

use gameshelf_core::ColorScheme;
use ratatui::{layout::Rect, style::Color};

const MAX_INPUT_LEN: usize = 120;

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary_fg: Color,
    pub accent: Color,
    pub muted: Color,
    pub selection_bg: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
}

impl Theme {
    pub fn for_scheme(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Dark => Self {
                primary_fg: Color::Rgb(0xff, 0xff, 0xff),
                accent: Color::Rgb(0x21, 0x96, 0xf3),
                muted: Color::Rgb(0xaa, 0xaa, 0xaa),
                selection_bg: Color::Rgb(0x44, 0x44, 0x44),
                success: Color::Rgb(0x4c, 0xaf, 0x50),
                warning: Color::Yellow,
                danger: Color::Rgb(0xf4, 0x43, 0x36),
            },
            ColorScheme::Light => Self {
                primary_fg: Color::Rgb(0x00, 0x00, 0x00),
                accent: Color::Rgb(0x21, 0x96, 0xf3),
                muted: Color::Rgb(0x55, 0x55, 0x55),
                selection_bg: Color::Rgb(0xe0, 0xe0, 0xe0),
                success: Color::Rgb(0x4c, 0xaf, 0x50),
                warning: Color::Rgb(0xb2, 0x6a, 0x00),
                danger: Color::Rgb(0xf4, 0x43, 0x36),
            },
        }
    }
}

/// Single-line text input. The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    input: String,
    cursor: usize,
}

impl TextInput {
    pub fn with_value(value: &str) -> Self {
        Self {
            input: value.to_string(),
            cursor: value.chars().count(),
        }
    }

    pub fn value(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map(|(index, _)| index)
            .unwrap_or(self.input.len())
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, self.len() as isize) as usize;
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.len();
    }

    pub fn insert(&mut self, ch: char) {
        if self.len() >= MAX_INPUT_LEN || ch.is_control() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_index(self.cursor);
        self.input.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_index(self.cursor);
            self.input.remove(at);
        }
    }
}

/// Cursor and scroll offset over a list of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    pub cursor: usize,
    pub offset: usize,
    pub height: usize,
}

impl Default for ListCursor {
    fn default() -> Self {
        Self {
            cursor: 0,
            offset: 0,
            height: 1,
        }
    }
}

impl ListCursor {
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.offset = 0;
    }

    pub fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.reset();
            return;
        }
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, len as isize - 1) as usize;
        self.ensure_visible(len);
    }

    pub fn move_to_end(&mut self, len: usize) {
        self.cursor = len.saturating_sub(1);
        self.ensure_visible(len);
    }

    pub fn page(&mut self, direction: isize, len: usize) {
        let delta = self.height.min(len).max(1) as isize;
        self.move_by(delta * direction, len);
    }

    pub fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.reset();
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
        self.ensure_visible(len);
    }

    pub fn ensure_visible(&mut self, len: usize) {
        if len == 0 || self.height == 0 {
            self.offset = 0;
            return;
        }
        let height = self.height;
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + height {
            self.offset = self.cursor + 1 - height;
        }
        self.offset = self.offset.min(len.saturating_sub(height));
    }
}

pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes_differ_in_text_and_selection_colours() {
        let dark = Theme::for_scheme(ColorScheme::Dark);
        let light = Theme::for_scheme(ColorScheme::Light);
        assert_ne!(dark.primary_fg, light.primary_fg);
        assert_ne!(dark.selection_bg, light.selection_bg);
        assert_eq!(dark.danger, light.danger);
    }

    #[test]
    fn edits_multibyte_text() {
        let mut input = TextInput::with_value("Pelikauppa");
        input.move_home();
        input.insert('ä');
        input.insert('ö');
        assert_eq!(input.value(), "äöPelikauppa");
        input.backspace();
        assert_eq!(input.value(), "äPelikauppa");
        input.move_cursor(-5);
        input.delete();
        assert_eq!(input.value(), "Pelikauppa");
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn cursor_scrolls_within_list() {
        let mut list = ListCursor {
            height: 3,
            ..ListCursor::default()
        };
        list.move_by(4, 10);
        assert_eq!((list.cursor, list.offset), (4, 2));
        list.move_to_end(10);
        assert_eq!((list.cursor, list.offset), (9, 7));
        list.clamp(2);
        assert_eq!((list.cursor, list.offset), (1, 0));
        list.move_by(1, 0);
        assert_eq!(list, ListCursor { height: 3, ..ListCursor::default() });
    }
}
