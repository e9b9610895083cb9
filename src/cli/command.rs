use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Run the full session walkthrough",
        long_about = "Emit schema, create a user, commit it, stage and roll back a second user, then list users ordered by id and as (name, full_name) pairs."
    )]
    Walkthrough {
        #[arg(long, default_value = "Rajdeep", help = "Name of the user to create")]
        name: String,
        #[arg(
            long = "full-name",
            default_value = "Rajdeep Mukherjee",
            help = "Full name of the user to create"
        )]
        full_name: String,
    },
    #[command(
        about = "Create missing tables",
        long_about = "Emit CREATE TABLE IF NOT EXISTS for every mapped model."
    )]
    CreateAll,
    #[command(about = "Insert one user and print its id")]
    Add {
        #[arg(long, help = "Short name (at most 20 characters)")]
        name: String,
        #[arg(long = "full-name", help = "Full name (at most 20 characters)")]
        full_name: String,
    },
    #[command(about = "List users ordered by id")]
    List {
        #[arg(long, default_value_t = false, help = "Newest first")]
        desc: bool,
        #[arg(long, default_value_t = false, help = "Print one JSON object per line")]
        json: bool,
    },
    #[command(about = "Print name and full name of every user")]
    Names,
    #[command(about = "Change the name of one user")]
    Rename {
        #[arg(long, value_name = "ID")]
        id: i64,
        #[arg(long)]
        name: String,
    },
    #[command(about = "Delete one user")]
    Delete {
        #[arg(long, value_name = "ID")]
        id: i64,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Walkthrough {
            name: "Rajdeep".to_string(),
            full_name: "Rajdeep Mukherjee".to_string(),
        }
    }
}
