//! The closed command set.
//!
//! Handlers reply in plain text, are gated on the issuer's admin status where
//! the command changes anything, and additionally on the bot's own admin
//! rights before group-mutating platform calls. Replies and actions are
//! best-effort; a failed platform call is logged and abandoned.

use crate::{
    dispatch::Dispatcher,
    domain::{ChatTarget, GroupId, UserId},
    errors::Error,
    poll::PollResult,
};

pub(crate) async fn handle_command(
    d: &Dispatcher,
    group: &GroupId,
    sender: &UserId,
    name: &str,
    args: &[String],
    mentions: &[UserId],
) {
    match name {
        "help" => reply(d, group, &help_text(d.prefix)).await,
        "ping" => reply(d, group, "pong").await,
        "info" => info(d, group).await,
        "export" => export(d, group).await,

        "welcome" => welcome(d, group, sender, args).await,
        "welcomepv" => welcomepv(d, group, sender, args).await,
        "goodbye" => goodbye(d, group, sender, args).await,

        "antilink" => antilink(d, group, sender, args).await,
        "antiwords" => antiwords(d, group, sender, args).await,
        "ban" => ban(d, group, sender, mentions).await,
        "removeall" => removeall(d, group, sender).await,

        "promote" | "demote" => change_role(d, group, sender, name, mentions).await,
        "add" => add(d, group, sender, args).await,
        "tagall" | "tagallcut" => tagall(d, group, sender, name, args).await,
        "rename" => rename(d, group, sender, args).await,
        "desc" => desc(d, group, sender, args).await,

        "chatbot" => chatbot(d, group, sender, args).await,
        "poll" => poll(d, group, args).await,

        "mensege" => reply(d, group, "Scheduled posting is not supported.").await,
        _ => {
            let p = d.prefix;
            reply(d, group, &format!("Unknown command. Send {p}help for the command list.")).await;
        }
    }
}

async fn reply(d: &Dispatcher, group: &GroupId, text: &str) {
    if let Err(e) = d
        .transport
        .send_message(ChatTarget::Group(group.clone()), text, &[])
        .await
    {
        tracing::warn!("reply to {group} failed: {e}");
    }
}

async fn require_admin(d: &Dispatcher, group: &GroupId, sender: &UserId) -> bool {
    if d.oracle.is_admin(group, sender).await {
        return true;
    }
    reply(d, group, "You must be a group admin to use this command.").await;
    false
}

async fn require_bot_admin(d: &Dispatcher, group: &GroupId) -> bool {
    if d.oracle.is_bot_admin(group).await {
        return true;
    }
    reply(d, group, "I need admin rights in this group to do that.").await;
    false
}

fn arg(args: &[String], index: usize) -> Option<&str> {
    args.get(index).map(String::as_str)
}

fn help_text(p: char) -> String {
    format!(
        "Available commands:
{p}help - this list
{p}ping - check the bot
{p}info - group stats
{p}export - roster listing

Greetings:
{p}welcome on/off | set <message>
{p}welcomepv on/off | set <message>
{p}goodbye on/off | set <message>

Moderation:
{p}antilink on/off | ban on/off
{p}antiwords on/off | ban on/off | add <word> | remove <word> | list
{p}ban @user
{p}removeall

Administration:
{p}promote @user | {p}demote @user
{p}add <numbers separated by ,>
{p}tagall <message> | {p}tagallcut <message>
{p}rename <name> | {p}desc <text>

Chatbot:
{p}chatbot on/off | add <trigger>=<reply> | remove <trigger> | list

Polls:
{p}poll <question>=<option1>=<option2>
{p}poll result"
    )
}

async fn info(d: &Dispatcher, group: &GroupId) {
    let Some(roster) = d.oracle.roster(group).await else {
        reply(d, group, "Could not fetch the group roster.").await;
        return;
    };
    let admins = roster.iter().filter(|e| e.is_admin).count();
    reply(
        d,
        group,
        &format!("Members: {} ({} admins)", roster.len(), admins),
    )
    .await;
}

async fn export(d: &Dispatcher, group: &GroupId) {
    let Some(roster) = d.oracle.roster(group).await else {
        reply(d, group, "Could not fetch the group roster.").await;
        return;
    };

    let mut out = String::from("participant,admin");
    for entry in &roster {
        out.push('\n');
        out.push_str(entry.id.bare());
        out.push(',');
        out.push_str(if entry.is_admin { "yes" } else { "no" });
    }
    reply(d, group, &out).await;
}

async fn welcome(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let text = match arg(args, 0) {
        Some("on") => {
            d.settings.update(group, |s| s.welcome.enabled = true).await;
            "Welcome messages enabled."
        }
        Some("off") => {
            d.settings.update(group, |s| s.welcome.enabled = false).await;
            "Welcome messages disabled."
        }
        Some("set") => {
            let message = args[1..].join(" ");
            if message.is_empty() {
                "Usage: welcome set <message>"
            } else {
                d.settings.update(group, |s| s.welcome.message = message).await;
                "Welcome message set."
            }
        }
        _ => "Usage: welcome on/off | set <message>",
    };
    reply(d, group, text).await;
}

async fn welcomepv(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let text = match arg(args, 0) {
        Some("on") => {
            d.settings
                .update(group, |s| s.welcome.private.enabled = true)
                .await;
            "Private welcome messages enabled."
        }
        Some("off") => {
            d.settings
                .update(group, |s| s.welcome.private.enabled = false)
                .await;
            "Private welcome messages disabled."
        }
        Some("set") => {
            let message = args[1..].join(" ");
            if message.is_empty() {
                "Usage: welcomepv set <message>"
            } else {
                d.settings
                    .update(group, |s| s.welcome.private.message = message)
                    .await;
                "Private welcome message set."
            }
        }
        _ => "Usage: welcomepv on/off | set <message>",
    };
    reply(d, group, text).await;
}

async fn goodbye(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let text = match arg(args, 0) {
        Some("on") => {
            d.settings.update(group, |s| s.goodbye.enabled = true).await;
            "Goodbye messages enabled."
        }
        Some("off") => {
            d.settings.update(group, |s| s.goodbye.enabled = false).await;
            "Goodbye messages disabled."
        }
        Some("set") => {
            let message = args[1..].join(" ");
            if message.is_empty() {
                "Usage: goodbye set <message>"
            } else {
                d.settings.update(group, |s| s.goodbye.message = message).await;
                "Goodbye message set."
            }
        }
        _ => "Usage: goodbye on/off | set <message>",
    };
    reply(d, group, text).await;
}

async fn antilink(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let text = match (arg(args, 0), arg(args, 1)) {
        (Some("on"), _) => {
            d.settings.update(group, |s| s.antilink.enabled = true).await;
            "Anti-link enabled."
        }
        (Some("off"), _) => {
            d.settings.update(group, |s| s.antilink.enabled = false).await;
            "Anti-link disabled."
        }
        (Some("ban"), Some("on")) => {
            d.settings.update(group, |s| s.antilink.ban = true).await;
            "Ban on link violations enabled."
        }
        (Some("ban"), Some("off")) => {
            d.settings.update(group, |s| s.antilink.ban = false).await;
            "Ban on link violations disabled."
        }
        _ => "Usage: antilink on/off | ban on/off",
    };
    reply(d, group, text).await;
}

async fn antiwords(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let text = match (arg(args, 0), arg(args, 1)) {
        (Some("on"), _) => {
            d.settings.update(group, |s| s.antiwords.enabled = true).await;
            "Word filter enabled.".to_string()
        }
        (Some("off"), _) => {
            d.settings.update(group, |s| s.antiwords.enabled = false).await;
            "Word filter disabled.".to_string()
        }
        (Some("ban"), Some("on")) => {
            d.settings.update(group, |s| s.antiwords.ban = true).await;
            "Ban on word violations enabled.".to_string()
        }
        (Some("ban"), Some("off")) => {
            d.settings.update(group, |s| s.antiwords.ban = false).await;
            "Ban on word violations disabled.".to_string()
        }
        (Some("add"), Some(word)) => {
            let word = word.to_string();
            let added = d
                .settings
                .update(group, |s| s.antiwords.add_word(&word))
                .await;
            if added {
                format!("Word \"{}\" added.", word.to_lowercase())
            } else {
                "That word is already on the list.".to_string()
            }
        }
        (Some("add"), None) => "Usage: antiwords add <word>".to_string(),
        (Some("remove"), Some(word)) => {
            let word = word.to_string();
            let removed = d
                .settings
                .update(group, |s| s.antiwords.remove_word(&word))
                .await;
            if removed {
                format!("Word \"{}\" removed.", word.to_lowercase())
            } else {
                "That word is not on the list.".to_string()
            }
        }
        (Some("remove"), None) => "Usage: antiwords remove <word>".to_string(),
        (Some("list"), _) => {
            let words = d.settings.snapshot(group).await.antiwords.words;
            if words.is_empty() {
                "The word list is empty.".to_string()
            } else {
                format!(
                    "Forbidden words: {}",
                    words.into_iter().collect::<Vec<_>>().join(", ")
                )
            }
        }
        _ => "Usage: antiwords on/off | ban on/off | add <word> | remove <word> | list".to_string(),
    };
    reply(d, group, &text).await;
}

async fn ban(d: &Dispatcher, group: &GroupId, sender: &UserId, mentions: &[UserId]) {
    if !require_admin(d, group, sender).await || !require_bot_admin(d, group).await {
        return;
    }
    if mentions.is_empty() {
        reply(d, group, "Mention the user(s) to remove.").await;
        return;
    }

    let mut removed = 0usize;
    for target in mentions {
        match d.transport.remove_participant(group, target).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("failed to remove {target} from {group}: {e}"),
        }
    }
    d.oracle.invalidate(group).await;

    let text = if removed == mentions.len() {
        format!("Removed {removed} user(s).")
    } else {
        format!("Removed {removed} of {} users.", mentions.len())
    };
    reply(d, group, &text).await;
}

async fn removeall(d: &Dispatcher, group: &GroupId, sender: &UserId) {
    if !require_admin(d, group, sender).await || !require_bot_admin(d, group).await {
        return;
    }
    let Some(roster) = d.oracle.roster(group).await else {
        reply(d, group, "Could not fetch the group roster.").await;
        return;
    };

    let mut removed = 0usize;
    for entry in roster.iter().filter(|e| !e.is_admin) {
        match d.transport.remove_participant(group, &entry.id).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("failed to remove {} from {group}: {e}", entry.id),
        }
    }
    d.oracle.invalidate(group).await;
    reply(d, group, &format!("Removed {removed} non-admin member(s).")).await;
}

async fn change_role(
    d: &Dispatcher,
    group: &GroupId,
    sender: &UserId,
    name: &str,
    mentions: &[UserId],
) {
    if !require_admin(d, group, sender).await || !require_bot_admin(d, group).await {
        return;
    }
    if mentions.is_empty() {
        reply(d, group, "Mention the user(s).").await;
        return;
    }

    let mut changed = 0usize;
    for target in mentions {
        let outcome = if name == "promote" {
            d.transport.promote_participant(group, target).await
        } else {
            d.transport.demote_participant(group, target).await
        };
        match outcome {
            Ok(()) => changed += 1,
            Err(e) => tracing::warn!("failed to {name} {target} in {group}: {e}"),
        }
    }
    d.oracle.invalidate(group).await;

    let verb = if name == "promote" { "Promoted" } else { "Demoted" };
    reply(d, group, &format!("{verb} {changed} user(s).")).await;
}

async fn add(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await || !require_bot_admin(d, group).await {
        return;
    }
    let numbers: Vec<String> = args
        .join("")
        .split(',')
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if numbers.is_empty() {
        reply(d, group, "Usage: add <numbers separated by ,>").await;
        return;
    }

    for number in &numbers {
        if let Err(e) = d
            .transport
            .add_participant(group, &UserId(number.clone()))
            .await
        {
            tracing::warn!("failed to add {number} to {group}: {e}");
        }
    }
    d.oracle.invalidate(group).await;
    reply(d, group, "Invites sent.").await;
}

async fn tagall(d: &Dispatcher, group: &GroupId, sender: &UserId, name: &str, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let Some(roster) = d.oracle.roster(group).await else {
        reply(d, group, "Could not fetch the group roster.").await;
        return;
    };
    let mentions: Vec<UserId> = roster.into_iter().map(|e| e.id).collect();
    let text = args.join(" ");

    if name == "tagall" {
        let content = if text.is_empty() {
            "Attention, everyone.".to_string()
        } else {
            text
        };
        if let Err(e) = d
            .transport
            .send_message(ChatTarget::Group(group.clone()), &content, &mentions)
            .await
        {
            tracing::warn!("tagall in {group} failed: {e}");
        }
        return;
    }

    // tagallcut: the mentions ride on an invisible body, the text follows alone.
    let hidden = "\u{200e}".repeat(5000);
    if let Err(e) = d
        .transport
        .send_message(ChatTarget::Group(group.clone()), &hidden, &mentions)
        .await
    {
        tracing::warn!("tagallcut in {group} failed: {e}");
    }
    if !text.is_empty() {
        reply(d, group, &text).await;
    }
}

async fn rename(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await || !require_bot_admin(d, group).await {
        return;
    }
    let subject = args.join(" ");
    if subject.is_empty() {
        reply(d, group, "Usage: rename <name>").await;
        return;
    }
    match d.transport.set_group_subject(group, &subject).await {
        Ok(()) => reply(d, group, "Group name updated.").await,
        Err(e) => {
            tracing::warn!("rename of {group} failed: {e}");
            reply(d, group, "Could not rename the group.").await;
        }
    }
}

async fn desc(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await || !require_bot_admin(d, group).await {
        return;
    }
    let description = args.join(" ");
    if description.is_empty() {
        reply(d, group, "Usage: desc <text>").await;
        return;
    }
    match d.transport.set_group_description(group, &description).await {
        Ok(()) => reply(d, group, "Group description updated.").await,
        Err(e) => {
            tracing::warn!("description update of {group} failed: {e}");
            reply(d, group, "Could not update the description.").await;
        }
    }
}

async fn chatbot(d: &Dispatcher, group: &GroupId, sender: &UserId, args: &[String]) {
    if !require_admin(d, group, sender).await {
        return;
    }
    let text = match arg(args, 0) {
        Some("on") => {
            d.settings.update(group, |s| s.chatbot.enabled = true).await;
            "Chatbot enabled.".to_string()
        }
        Some("off") => {
            d.settings.update(group, |s| s.chatbot.enabled = false).await;
            "Chatbot disabled.".to_string()
        }
        Some("add") => {
            let rest = args[1..].join(" ");
            match rest.split_once('=') {
                Some((trigger, canned)) if !trigger.trim().is_empty() && !canned.trim().is_empty() => {
                    let trigger = trigger.trim().to_lowercase();
                    let canned = canned.trim().to_string();
                    d.settings
                        .update(group, |s| s.chatbot.triggers.insert(trigger, canned))
                        .await;
                    "Trigger added.".to_string()
                }
                _ => "Usage: chatbot add <trigger>=<reply>".to_string(),
            }
        }
        Some("remove") => match arg(args, 1) {
            Some(trigger) => {
                let trigger = trigger.to_lowercase();
                let removed = d
                    .settings
                    .update(group, |s| s.chatbot.triggers.remove(&trigger))
                    .await;
                if removed.is_some() {
                    "Trigger removed.".to_string()
                } else {
                    "No such trigger.".to_string()
                }
            }
            None => "Usage: chatbot remove <trigger>".to_string(),
        },
        Some("list") => {
            let triggers = d.settings.snapshot(group).await.chatbot.triggers;
            if triggers.is_empty() {
                "No triggers configured.".to_string()
            } else {
                let mut out = String::from("Triggers:");
                for trigger in triggers.keys() {
                    out.push('\n');
                    out.push_str(trigger);
                }
                out
            }
        }
        _ => "Usage: chatbot on/off | add <trigger>=<reply> | remove <trigger> | list".to_string(),
    };
    reply(d, group, &text).await;
}

async fn poll(d: &Dispatcher, group: &GroupId, args: &[String]) {
    if arg(args, 0) == Some("result") {
        match d.polls.compute_result(group, None).await {
            Some(result) => reply(d, group, &format_poll_result(&result)).await,
            None => reply(d, group, "No poll has been created in this group yet.").await,
        }
        return;
    }

    let raw = args.join(" ");
    let mut parts = raw.split('=');
    let question = parts.next().unwrap_or("").to_string();
    let options: Vec<String> = parts.map(|p| p.to_string()).collect();

    match d.polls.create_poll(group, &question, options).await {
        Ok(_) => {} // the emitted poll is the visible outcome
        Err(Error::Validation(_)) => {
            reply(d, group, "Usage: poll <question>=<option1>=<option2>").await;
        }
        Err(e) => {
            tracing::warn!("poll creation in {group} failed: {e}");
            reply(d, group, "Could not create the poll.").await;
        }
    }
}

pub(crate) fn format_poll_result(result: &PollResult) -> String {
    let mut out = format!("Poll: {}", result.question);
    for (index, option) in result.options.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {} - {} vote(s), {:.1}%",
            index + 1,
            option.label,
            option.count,
            option.percent
        ));
        if !option.sample_voters.is_empty() {
            let names: Vec<&str> = option.sample_voters.iter().map(|v| v.bare()).collect();
            out.push_str(&format!(" ({}", names.join(", ")));
            if option.more_voters > 0 {
                out.push_str(&format!(" +{} more", option.more_voters));
            }
            out.push(')');
        }
    }
    out.push_str(&format!("\nTotal votes: {}", result.total_votes));
    out
}
