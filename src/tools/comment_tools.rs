// Drive comments on documents: listing, reading, replying, resolving and deleting.

use anyhow::Context;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use super::display_time;
use crate::core::tools::{RegistryError, RenderText, Tool, ToolContext, ToolRegistry};
use crate::core::workspace::Comment;

pub fn register(registry: &mut ToolRegistry) -> Result<(), RegistryError> {
    registry.register(ListComments)?;
    registry.register(GetComment)?;
    registry.register(AddComment)?;
    registry.register(ReplyToComment)?;
    registry.register(ResolveComment)?;
    registry.register(DeleteComment)?;
    Ok(())
}

pub struct ListComments;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsInput {
    /// The ID of the Google Document.
    #[schemars(length(min = 1))]
    pub document_id: String,
}

pub struct CommentList(Vec<Comment>);

impl RenderText for CommentList {
    fn render(&self) -> String {
        if self.0.is_empty() {
            return "No comments found on this document.".to_string();
        }

        let mut out = format!("**Comments ({} found)**\n\n", self.0.len());
        for (i, comment) in self.0.iter().enumerate() {
            let status = if comment.resolved { " [RESOLVED]" } else { "" };
            out.push_str(&format!(
                "{}. **{}** ({}){}\n",
                i + 1,
                comment.author.as_deref().unwrap_or("Unknown"),
                display_time(comment.created_time),
                status
            ));
            if let Some(quoted) = &comment.quoted_text {
                out.push_str(&format!("   > {}\n", quoted));
            }
            out.push_str(&format!("   {}\n", comment.content));
            if comment.reply_count > 0 {
                out.push_str(&format!("   Replies: {}\n", comment.reply_count));
            }
            out.push_str(&format!("   Comment ID: {}\n\n", comment.id));
        }
        out
    }
}

#[async_trait]
impl Tool for ListComments {
    type Input = ListCommentsInput;
    type Output = CommentList;

    fn name(&self) -> &'static str {
        "listComments"
    }

    fn description(&self) -> &'static str {
        "Lists the comments on a Google Document with their authors, quoted text and status."
    }

    async fn execute(&self, input: &ListCommentsInput, ctx: &ToolContext) -> anyhow::Result<CommentList> {
        let comments = ctx
            .services
            .files
            .list_comments(&input.document_id)
            .await
            .with_context(|| format!("Failed to list comments on document {}", input.document_id))?;
        Ok(CommentList(comments))
    }
}

/// Targets one comment on one document.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommentRefInput {
    /// The ID of the Google Document.
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The comment ID, as shown by listComments.
    #[schemars(length(min = 1))]
    pub comment_id: String,
}

pub struct GetComment;

/// A single comment with its reply thread.
pub struct CommentThread(Comment);

impl RenderText for CommentThread {
    fn render(&self) -> String {
        let comment = &self.0;
        let status = if comment.resolved { " [RESOLVED]" } else { "" };
        let mut out = format!(
            "**{}** ({}){}\n",
            comment.author.as_deref().unwrap_or("Unknown"),
            display_time(comment.created_time),
            status
        );
        if let Some(quoted) = &comment.quoted_text {
            out.push_str(&format!("> {}\n", quoted));
        }
        out.push_str(&format!("{}\n", comment.content));

        if !comment.replies.is_empty() {
            out.push_str(&format!("\n**Replies ({})**\n", comment.replies.len()));
            for (i, reply) in comment.replies.iter().enumerate() {
                out.push_str(&format!(
                    "{}. **{}** ({})\n   {}\n",
                    i + 1,
                    reply.author.as_deref().unwrap_or("Unknown"),
                    display_time(reply.created_time),
                    reply.content
                ));
            }
        }
        out.push_str(&format!("\nComment ID: {}", comment.id));
        out
    }
}

#[async_trait]
impl Tool for GetComment {
    type Input = CommentRefInput;
    type Output = CommentThread;

    fn name(&self) -> &'static str {
        "getComment"
    }

    fn description(&self) -> &'static str {
        "Gets one comment on a Google Document together with all of its replies."
    }

    async fn execute(&self, input: &CommentRefInput, ctx: &ToolContext) -> anyhow::Result<CommentThread> {
        let comment = ctx
            .services
            .files
            .get_comment(&input.document_id, &input.comment_id)
            .await
            .with_context(|| format!("Failed to get comment {}", input.comment_id))?;
        Ok(CommentThread(comment))
    }
}

pub struct AddComment;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentInput {
    /// The ID of the Google Document.
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The comment text.
    #[schemars(length(min = 1))]
    pub content: String,
}

#[async_trait]
impl Tool for AddComment {
    type Input = AddCommentInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "addComment"
    }

    fn description(&self) -> &'static str {
        "Adds a comment to a Google Document. The comment is not anchored to specific text."
    }

    async fn execute(&self, input: &AddCommentInput, ctx: &ToolContext) -> anyhow::Result<String> {
        ctx.log.info(&format!("Adding comment to document {}", input.document_id));

        let comment = ctx
            .services
            .files
            .create_comment(&input.document_id, &input.content)
            .await
            .with_context(|| format!("Failed to add comment to document {}", input.document_id))?;

        Ok(format!(
            "Comment added successfully.\n\n**Comment ID:** {}\n**Author:** {}",
            comment.id,
            comment.author.as_deref().unwrap_or("Unknown")
        ))
    }
}

pub struct ReplyToComment;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyToCommentInput {
    /// The ID of the Google Document.
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The comment to reply to.
    #[schemars(length(min = 1))]
    pub comment_id: String,
    /// The reply text.
    #[schemars(length(min = 1))]
    pub content: String,
}

#[async_trait]
impl Tool for ReplyToComment {
    type Input = ReplyToCommentInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "replyToComment"
    }

    fn description(&self) -> &'static str {
        "Adds a reply to an existing comment on a Google Document."
    }

    async fn execute(&self, input: &ReplyToCommentInput, ctx: &ToolContext) -> anyhow::Result<String> {
        ctx.log.info(&format!("Replying to comment {}", input.comment_id));

        let reply = ctx
            .services
            .files
            .reply_to_comment(&input.document_id, &input.comment_id, &input.content)
            .await
            .with_context(|| format!("Failed to reply to comment {}", input.comment_id))?;

        Ok(format!(
            "Reply added successfully.\n\n**Reply ID:** {}\n**Author:** {}",
            reply.id,
            reply.author.as_deref().unwrap_or("Unknown")
        ))
    }
}

pub struct ResolveComment;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveCommentInput {
    /// The ID of the Google Document.
    #[schemars(length(min = 1))]
    pub document_id: String,
    /// The comment to resolve.
    #[schemars(length(min = 1))]
    pub comment_id: String,
    /// Optional closing note posted with the resolution.
    pub message: Option<String>,
}

#[async_trait]
impl Tool for ResolveComment {
    type Input = ResolveCommentInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "resolveComment"
    }

    fn description(&self) -> &'static str {
        "Marks a comment on a Google Document as resolved, optionally with a closing note."
    }

    async fn execute(&self, input: &ResolveCommentInput, ctx: &ToolContext) -> anyhow::Result<String> {
        ctx.log.info(&format!("Resolving comment {}", input.comment_id));

        let message = input.message.as_deref().filter(|m| !m.trim().is_empty());
        ctx.services
            .files
            .resolve_comment(&input.document_id, &input.comment_id, message)
            .await
            .with_context(|| format!("Failed to resolve comment {}", input.comment_id))?;

        Ok(format!("Comment {} marked as resolved.", input.comment_id))
    }
}

pub struct DeleteComment;

#[async_trait]
impl Tool for DeleteComment {
    type Input = CommentRefInput;
    type Output = String;

    fn name(&self) -> &'static str {
        "deleteComment"
    }

    fn description(&self) -> &'static str {
        "Permanently deletes a comment and its replies from a Google Document."
    }

    async fn execute(&self, input: &CommentRefInput, ctx: &ToolContext) -> anyhow::Result<String> {
        ctx.log.info(&format!("Deleting comment {}", input.comment_id));

        ctx.services
            .files
            .delete_comment(&input.document_id, &input.comment_id)
            .await
            .with_context(|| format!("Failed to delete comment {}", input.comment_id))?;

        Ok(format!("Comment {} deleted.", input.comment_id))
    }
}
