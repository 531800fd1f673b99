use std::str::{self, FromStr};

use ::errors::{ErrorKind, Result};
use ::geom::Point;
use super::bsp::LumpEntry;


pub const MAX_TOKEN_LENGTH: usize = 1024;


/// One `{ ... }` block from a level's entity text.  Only the keys the loader cares about are
/// kept.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub classname: String,
    /// Already converted from the file's z-up axes
    pub origin: Point,
    /// Facing in degrees
    pub angle: i32,
    pub spawnflags: i32,
}

impl Entity {
    fn new() -> Entity {
        Entity{
            classname: String::new(),
            origin: Point::origin(),
            angle: 0,
            spawnflags: 0,
        }
    }
}


#[derive(Copy, Clone, Debug)]
enum State {
    OutsideEntity,
    InsideEntity,
    InsideString,
}

#[derive(Copy, Clone, Debug)]
enum Key {
    Classname,
    Origin,
    Angle,
    SpawnFlags,
    Ignored,
}

impl Key {
    fn from_token(token: &[u8]) -> Key {
        match token {
            b"classname" => Key::Classname,
            b"origin" => Key::Origin,
            b"angle" => Key::Angle,
            b"spawnflags" => Key::SpawnFlags,
            _ => Key::Ignored,
        }
    }
}

fn malformed<T>(offset: usize, reason: &'static str) -> Result<T> {
    Err(ErrorKind::MalformedEntityBlock(offset, reason).into())
}

fn parse_number<T: FromStr>(token: &[u8]) -> Option<T> {
    str::from_utf8(token).ok()?.trim().parse().ok()
}

/// Level files store (x, y, z) with z up; we want y up, so this becomes (x, -z, -y).
fn parse_origin(token: &[u8]) -> Option<Point> {
    let text = str::from_utf8(token).ok()?;
    let mut numbers = text.split_whitespace().map(f32::from_str);
    let x = numbers.next()?.ok()?;
    let y = numbers.next()?.ok()?;
    let z = numbers.next()?.ok()?;
    if numbers.next().is_some() {
        return None;
    }
    Some(Point::new(x, -z, -y))
}

fn apply_value(entity: &mut Entity, key: Key, value: &[u8], offset: usize) -> Result<()> {
    match key {
        Key::Classname => {
            entity.classname = String::from_utf8_lossy(value).into_owned();
        }
        Key::Origin => {
            entity.origin = match parse_origin(value) {
                Some(origin) => origin,
                None => return malformed(offset, "origin is not three numbers"),
            };
        }
        Key::Angle => {
            // Some editors write fractional angles
            entity.angle = match parse_number::<f32>(value) {
                Some(angle) => angle as i32,
                None => return malformed(offset, "angle is not a number"),
            };
        }
        Key::SpawnFlags => {
            entity.spawnflags = match parse_number(value) {
                Some(flags) => flags,
                None => return malformed(offset, "spawnflags is not an integer"),
            };
        }
        Key::Ignored => {}
    }
    Ok(())
}


/// Run the entity text through a small state machine: outside any entity, inside one, and inside
/// a quoted string.  Quoted tokens within an entity alternate between keys and values.  Anything
/// outside quotes that isn't a brace is ignored, including the trailing NUL most compilers write.
pub fn parse_entities(text: &[u8]) -> Result<Vec<Entity>> {
    let mut entities = Vec::new();
    let mut state = State::OutsideEntity;
    let mut entity = Entity::new();
    let mut key = Key::Ignored;
    let mut expecting_value = false;
    let mut token_start = 0;

    for (offset, &ch) in text.iter().enumerate() {
        match state {
            State::OutsideEntity => match ch {
                b'{' => {
                    entity = Entity::new();
                    expecting_value = false;
                    state = State::InsideEntity;
                }
                b'}' => return malformed(offset, "closing brace outside an entity"),
                _ => {}
            },
            State::InsideEntity => match ch {
                b'"' => {
                    token_start = offset + 1;
                    state = State::InsideString;
                }
                b'}' => {
                    entities.push(entity.clone());
                    state = State::OutsideEntity;
                }
                b'{' => return malformed(offset, "opening brace inside an entity"),
                _ => {}
            },
            State::InsideString => {
                if ch == b'"' {
                    let token = &text[token_start..offset];
                    if expecting_value {
                        apply_value(&mut entity, key, token, token_start)?;
                    }
                    else {
                        key = Key::from_token(token);
                    }
                    expecting_value = !expecting_value;
                    state = State::InsideEntity;
                }
                else if offset - token_start >= MAX_TOKEN_LENGTH {
                    return malformed(token_start, "token is too long");
                }
            }
        }
    }

    match state {
        State::OutsideEntity => Ok(entities),
        State::InsideEntity => malformed(text.len(), "text ends inside an entity"),
        State::InsideString => malformed(token_start - 1, "unterminated string"),
    }
}

/// Parse the entities lump straight out of a level buffer.
pub fn parse_entity_lump(buf: &[u8], lump: &LumpEntry) -> Result<Vec<Entity>> {
    let start = lump.offset as usize;
    let end = start + lump.length as usize;
    match buf.get(start..end) {
        Some(text) => parse_entities(text),
        None => Err(ErrorKind::LumpOutOfBounds("entities").into()),
    }
}
