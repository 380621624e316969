//! Key-name handling: friendly aliases and X11 keysym lookup.

/// Map a human-friendly key name to its canonical keysym name.
///
/// Matching is case-insensitive; names without an alias are returned as-is.
pub fn canonical_key(key: &str) -> String {
    let alias = match key.to_ascii_lowercase().as_str() {
        "enter" | "return" => Some("Return"),
        "esc" | "escape" => Some("Escape"),
        "ctrl" | "control" => Some("Control_L"),
        "shift" => Some("Shift_L"),
        "alt" => Some("Alt_L"),
        "tab" => Some("Tab"),
        "backspace" => Some("BackSpace"),
        "cmd" | "super" => Some("Super_L"),
        _ => None,
    };
    alias.map(str::to_string).unwrap_or_else(|| key.to_string())
}

/// Resolve a key name to an X11 keysym.
///
/// Accepts canonical keysym names (`Return`, `Control_L`, `F5`, ...) and
/// single printable ASCII characters. Everything else is unknown.
pub fn keysym_for_name(name: &str) -> Option<u32> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return (ch.is_ascii_graphic() || ch == ' ').then_some(ch as u32);
    }

    let named = match name {
        "space" => 0x0020,
        "BackSpace" => 0xff08,
        "Tab" => 0xff09,
        "Return" => 0xff0d,
        "Pause" => 0xff13,
        "Escape" => 0xff1b,
        "Delete" => 0xffff,
        "Home" => 0xff50,
        "Left" => 0xff51,
        "Up" => 0xff52,
        "Right" => 0xff53,
        "Down" => 0xff54,
        "Page_Up" => 0xff55,
        "Page_Down" => 0xff56,
        "End" => 0xff57,
        "Insert" => 0xff63,
        "Menu" => 0xff67,
        "Shift_L" => 0xffe1,
        "Shift_R" => 0xffe2,
        "Control_L" => 0xffe3,
        "Control_R" => 0xffe4,
        "Caps_Lock" => 0xffe5,
        "Meta_L" => 0xffe7,
        "Meta_R" => 0xffe8,
        "Alt_L" => 0xffe9,
        "Alt_R" => 0xffea,
        "Super_L" => 0xffeb,
        "Super_R" => 0xffec,
        _ => return function_key(name),
    };
    Some(named)
}

/// Keysym used to type one character of literal text.
pub fn keysym_for_char(ch: char) -> u32 {
    match ch {
        '\n' | '\r' => 0xff0d,
        '\t' => 0xff09,
        // Latin-1 maps directly; everything else uses the Unicode keysym range.
        c if (c as u32) < 0x100 => c as u32,
        c => 0x0100_0000 | c as u32,
    }
}

fn function_key(name: &str) -> Option<u32> {
    let index: u32 = name.strip_prefix('F')?.parse().ok()?;
    (1..=12).contains(&index).then(|| 0xffbe + index - 1)
}
