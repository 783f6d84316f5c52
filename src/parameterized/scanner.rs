/// Lexical state while walking a SQL template.
#[derive(Clone, Copy)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
}

fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes[idx] == b'-' && bytes.get(idx + 1) == Some(&b'-')
}

fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes[idx] == b'/' && bytes.get(idx + 1) == Some(&b'*')
}

fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/')
}

/// Advance the state machine over `bytes[idx]`.
///
/// Returns `true` when the byte sits in normal SQL text, i.e. placeholder
/// syntax may start here. Doubled quotes inside literals need no lookahead:
/// the closing/reopening pair round-trips through `Normal` for zero bytes.
pub(super) fn scan(state: &mut State, bytes: &[u8], idx: usize) -> bool {
    let b = bytes[idx];
    match *state {
        State::Normal => {
            if b == b'\'' {
                *state = State::SingleQuoted;
            } else if b == b'"' {
                *state = State::DoubleQuoted;
            } else if is_line_comment_start(bytes, idx) {
                *state = State::LineComment;
            } else if is_block_comment_start(bytes, idx) {
                *state = State::BlockComment(1);
            } else {
                return true;
            }
            false
        }
        State::SingleQuoted => {
            if b == b'\'' {
                *state = State::Normal;
            }
            false
        }
        State::DoubleQuoted => {
            if b == b'"' {
                *state = State::Normal;
            }
            false
        }
        State::LineComment => {
            if b == b'\n' {
                *state = State::Normal;
            }
            false
        }
        State::BlockComment(depth) => {
            if is_block_comment_start(bytes, idx) {
                *state = State::BlockComment(depth + 1);
            } else if is_block_comment_end(bytes, idx) {
                *state = if depth == 1 {
                    State::Normal
                } else {
                    State::BlockComment(depth - 1)
                };
            }
            false
        }
    }
}

pub(super) fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
