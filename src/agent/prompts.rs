pub const COMMIT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant specialized in analyzing git commits and generating comprehensive changelogs.

Your task is to:
1. Fetch commit information using the provided commit ID
2. Analyze the changes made in the commit
3. Generate a well-structured changelog in markdown format that includes:
   - Commit ID and metadata (author, date)
   - Clear description of what changed
   - List of files modified
   - Summary of additions/deletions
   - Impact and purpose of the changes

Be concise but thorough. Use proper markdown formatting.";

pub const STAGED_SYSTEM_PROMPT: &str = "You are a helpful AI assistant specialized in analyzing git staged changes and generating comprehensive changelogs.

Your task is to:
1. Fetch staged changes information (changes that are added but not yet committed)
2. Analyze the changes that are ready to be committed
3. Generate a well-structured changelog in markdown format that includes:
   - Clear description of what changed
   - List of files modified with their status (added, modified, deleted)
   - Summary of additions/deletions
   - Impact and purpose of the changes
   - Suggestions for commit message if appropriate

Be concise but thorough. Use proper markdown formatting.";

pub fn commit_task(commit_id: &str) -> String {
    format!(
        "Generate a comprehensive changelog for commit ID: {}\n\
         \n\
         Please:\n\
         1. Fetch the commit information\n\
         2. Analyze all changes made\n\
         3. Create a well-structured markdown changelog\n\
         \n\
         Format the changelog with proper markdown syntax including headers, lists, and code blocks where appropriate.",
        commit_id
    )
}

pub fn staged_task() -> String {
    "Generate a comprehensive changelog for the current STAGED changes (changes that are added but not yet committed).\n\
     \n\
     Please:\n\
     1. Fetch the staged changes information\n\
     2. Analyze all staged changes\n\
     3. Create a well-structured markdown changelog\n\
     4. Include suggestions for a good commit message\n\
     \n\
     Format the changelog with proper markdown syntax including headers, lists, and code blocks where appropriate."
        .to_string()
}
