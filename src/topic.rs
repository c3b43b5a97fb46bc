//! Topic naming and matching.
//!
//! Topics are dot-separated: `<prefix>.<channel>[.<subtopic>]`, for example
//! `channels.9b7b1b3f.engine.temperature`. A subscription topic ending in
//! `.>` matches its own prefix and every topic nested below it.

use crate::error::{Error, Result};

/// Prefix under which all channel traffic is published.
pub const CHANNELS_PREFIX: &str = "channels";

/// Subscription topic covering every channel.
pub const SUBJECT_ALL_CHANNELS: &str = "channels.>";

/// Trailing segment that turns a topic into a wildcard subscription.
pub const WILDCARD_SUFFIX: &str = ".>";

const SEPARATOR: char = '.';

/// Normalize a raw subtopic into dot-separated segments.
///
/// `/` and whitespace act as separators, the wildcard characters `*` and `>`
/// are dropped, and empty segments collapse. The result may be empty.
pub fn sanitize_subtopic(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '*' && *c != '>')
        .map(|c| if c == '/' || c.is_whitespace() { SEPARATOR } else { c })
        .collect::<String>()
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

/// Build the concrete topic for a channel and optional subtopic.
///
/// ```
/// use relaybus::topic::build_topic;
///
/// let topic = build_topic("channels", "c1", "engine/temp").unwrap();
/// assert_eq!(topic, "channels.c1.engine.temp");
/// ```
pub fn build_topic(prefix: &str, channel: &str, subtopic: &str) -> Result<String> {
    if channel.is_empty() {
        return Err(Error::EmptyChannel);
    }
    if channel
        .chars()
        .any(|c| c == SEPARATOR || c == '*' || c == '>' || c.is_whitespace())
    {
        return Err(Error::MalformedTopic(channel.to_string()));
    }

    let mut topic = String::with_capacity(prefix.len() + channel.len() + subtopic.len() + 2);
    if !prefix.is_empty() {
        topic.push_str(prefix);
        topic.push(SEPARATOR);
    }
    topic.push_str(channel);

    let subtopic = sanitize_subtopic(subtopic);
    if !subtopic.is_empty() {
        topic.push(SEPARATOR);
        topic.push_str(&subtopic);
    }
    Ok(topic)
}

/// Split a concrete topic back into `(channel, subtopic)`.
pub fn parse(prefix: &str, topic: &str) -> Result<(String, String)> {
    if topic.is_empty() {
        return Err(Error::EmptyTopic);
    }

    let rest = if prefix.is_empty() {
        topic
    } else {
        topic
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix(SEPARATOR))
            .ok_or_else(|| Error::MalformedTopic(topic.to_string()))?
    };

    let (channel, subtopic) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
    if channel.is_empty() {
        return Err(Error::EmptyChannel);
    }
    Ok((channel.to_string(), subtopic.to_string()))
}

/// Whether a message published on `topic` is delivered to `subscription`.
pub fn matches(subscription: &str, topic: &str) -> bool {
    if subscription == ">" {
        return !topic.is_empty();
    }
    match subscription.strip_suffix(WILDCARD_SUFFIX) {
        Some(base) => {
            topic == base
                || (topic.len() > base.len()
                    && topic.starts_with(base)
                    && topic[base.len()..].starts_with(SEPARATOR))
        }
        None => subscription == topic,
    }
}
