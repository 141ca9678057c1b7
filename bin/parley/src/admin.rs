//! Admin subcommands. They drive the storage ports directly and print a
//! line per affected record to `out`.

use std::io::Write;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use pl_core::traits::{ClientStore, CommentStore, DomainStore};
use pl_core::{Client, CommentService, CommentsFilter};

#[derive(Subcommand, Debug)]
pub enum ClientCmd {
    /// Create a client and print its UUID and secret key
    Add { name: String },
    List,
    /// Remove a client with all of its domains and comments
    Remove { uuid: String },
    /// Replace a client's secret key
    RegenKey { uuid: String },
}

#[derive(Subcommand, Debug)]
pub enum DomainCmd {
    /// Allow `domain` (host only, e.g. `example.com`) for a client
    Add { uuid: String, domain: String },
    List,
    /// Remove a domain and its comments
    Remove { uuid: String, domain: String },
}

#[derive(Subcommand, Debug)]
pub enum CommentCmd {
    List {
        /// Only comments of this client
        #[arg(long)]
        client: Option<String>,
        /// Only comments under this domain; requires --client
        #[arg(long, requires = "client")]
        domain: Option<String>,
        #[arg(long)]
        page_url: Option<String>,
        #[arg(long)]
        hidden: Option<bool>,
    },
    Hide { id: i64 },
    Unhide { id: i64 },
    Remove { id: i64 },
}

async fn find_client<S: ClientStore + ?Sized>(store: &S, uuid: &str) -> Result<Client> {
    store
        .get_client_by_uuid(&uuid.to_lowercase())
        .await?
        .ok_or_else(|| anyhow!("client {uuid} not found"))
}

pub async fn client<S: ClientStore + ?Sized>(cmd: ClientCmd, store: &S, out: &mut impl Write) -> Result<()> {
    match cmd {
        ClientCmd::Add { name } => {
            let (client, key) = store.create_client(&name).await.context("creating client")?;
            writeln!(out, "uuid: {}", client.uuid)?;
            writeln!(out, "key:  {key}")?;
            writeln!(out, "The key is shown only once.")?;
        }
        ClientCmd::List => {
            for c in store.list_clients().await? {
                writeln!(out, "{}\t{}\t{}", c.id, c.uuid, c.name)?;
            }
        }
        ClientCmd::Remove { uuid } => {
            store.remove_client(&uuid.to_lowercase()).await?;
            writeln!(out, "client {uuid} removed")?;
        }
        ClientCmd::RegenKey { uuid } => {
            let (client, key) = store
                .regenerate_key(&uuid.to_lowercase())
                .await?
                .ok_or_else(|| anyhow!("client {uuid} not found"))?;
            writeln!(out, "uuid: {}", client.uuid)?;
            writeln!(out, "key:  {key}")?;
        }
    }
    Ok(())
}

pub async fn domain<S>(cmd: DomainCmd, store: &S, out: &mut impl Write) -> Result<()>
where
    S: ClientStore + DomainStore + ?Sized,
{
    match cmd {
        DomainCmd::Add { uuid, domain } => {
            let client = find_client(store, &uuid).await?;
            let cd = store
                .add_client_domain(&client, &domain)
                .await
                .with_context(|| format!("adding {domain} to {uuid}"))?;
            writeln!(out, "{}\t{}\t{}", cd.id, client.uuid, cd.domain)?;
        }
        DomainCmd::List => {
            for d in store.list_domains().await? {
                let owner = d.client.as_ref().map(|c| c.uuid.as_str()).unwrap_or("-");
                writeln!(out, "{}\t{}\t{}", d.id, owner, d.domain)?;
            }
        }
        DomainCmd::Remove { uuid, domain } => {
            let client = find_client(store, &uuid).await?;
            store.remove_client_domain(&client, &domain).await?;
            writeln!(out, "domain {domain} removed from {uuid}")?;
        }
    }
    Ok(())
}

pub async fn comment<S>(cmd: CommentCmd, store: Arc<S>, out: &mut impl Write) -> Result<()>
where
    S: ClientStore + DomainStore + CommentStore + 'static,
{
    let service = CommentService::new(store.clone());
    match cmd {
        CommentCmd::List {
            client,
            domain,
            page_url,
            hidden,
        } => {
            let mut filter = CommentsFilter {
                page_url,
                hidden,
                ..Default::default()
            };
            if let Some(uuid) = client {
                let client = find_client(store.as_ref(), &uuid).await?;
                filter.client_id = Some(client.id);
                if let Some(domain) = domain {
                    let cd = store
                        .get_client_domain(&client, &domain)
                        .await?
                        .ok_or_else(|| anyhow!("domain {domain} not found for {uuid}"))?;
                    filter.domain_id = Some(cd.id);
                }
            }
            for c in service.list(&filter).await? {
                let flag = if c.hidden { "hidden" } else { "visible" };
                writeln!(out, "{}\t{}\t{}\t{}\t{}\t{}", c.id, c.timestamp, flag, c.page_url, c.author, c.content)?;
            }
        }
        CommentCmd::Hide { id } => {
            service.set_hidden(id, true).await?;
            writeln!(out, "comment {id} hidden")?;
        }
        CommentCmd::Unhide { id } => {
            service.set_hidden(id, false).await?;
            writeln!(out, "comment {id} visible")?;
        }
        CommentCmd::Remove { id } => {
            service.remove(id).await?;
            writeln!(out, "comment {id} removed")?;
        }
    }
    Ok(())
}
