// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::Context;
use chrono::{Days, NaiveDate};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use library_loans::{
    BookId, FixedClock, Library, LibraryConfig, Loan, LoanError, LoanFilter, LoanId, LoanStatus,
    MemberId, MembershipStatus, NewBook, NewMember, SystemClock,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Library Loans - Replay a CSV of circulation commands
///
/// Reads commands from a CSV file and writes the resulting loans to stdout.
/// Supports registering books and members, and opening, returning, renewing
/// and deleting loans.
#[derive(Parser, Debug)]
#[command(name = "library-loans")]
#[command(about = "Replays library circulation commands and reports loans", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,book,member,loan,date,copies,status,name,email
    /// Example: cargo run -- commands.csv > loans.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// TOML file with library policy
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fine charged per day late, overrides the config file
    #[arg(long, value_name = "AMOUNT")]
    fine_rate: Option<Decimal>,

    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    today: Option<NaiveDate>,

    /// Log every rejected command
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);

    let mut config = match &args.config {
        Some(path) => LibraryConfig::load(path)
            .with_context(|| format!("loading config '{}'", path.display()))?,
        None => LibraryConfig::default(),
    };
    if let Some(rate) = args.fine_rate {
        config.fine_rate_per_day = rate;
        config.validate()?;
    }

    let library = match args.today {
        Some(today) => Library::from_config(&config, FixedClock(today)),
        None => Library::from_config(&config, SystemClock),
    };

    let file = File::open(&args.input)
        .with_context(|| format!("opening '{}'", args.input.display()))?;
    process_commands(&library, &config, BufReader::new(file))
        .context("processing commands")?;

    write_loans(&library, std::io::stdout()).context("writing output")?;
    Ok(())
}

fn init_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("library_loans=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("library_loans=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, book, member, loan, date, copies, status, name, email`.
/// Unused fields may be left empty or omitted at the end of the row.
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    book: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    member: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    loan: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    copies: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    status: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    name: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    email: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Command {
    AddBook { title: String, copies: u32 },
    AddMember(MemberRow),
    SetStatus { member: MemberId, status: MembershipStatus },
    Open { book: BookId, member: MemberId, due_date: Option<NaiveDate> },
    Return { loan: LoanId, date: Option<NaiveDate> },
    Renew { loan: LoanId, due_date: NaiveDate },
    Delete { loan: LoanId },
}

#[derive(Debug, PartialEq)]
struct MemberRow {
    name: String,
    email: String,
    status: MembershipStatus,
}

impl CommandRecord {
    /// Converts CSV record to a command.
    ///
    /// Returns `None` for unknown ops or missing required fields.
    fn into_command(self) -> Option<Command> {
        let status = match &self.status {
            Some(status) => Some(status.parse::<MembershipStatus>().ok()?),
            None => None,
        };

        match self.op.to_lowercase().as_str() {
            "book" => Some(Command::AddBook {
                title: self.name.unwrap_or_default(),
                copies: self.copies?,
            }),
            "member" => Some(Command::AddMember(MemberRow {
                name: self.name.unwrap_or_default(),
                email: self.email?,
                status: status.unwrap_or_default(),
            })),
            "status" => Some(Command::SetStatus {
                member: MemberId(self.member?),
                status: status?,
            }),
            "open" => Some(Command::Open {
                book: BookId(self.book?),
                member: MemberId(self.member?),
                due_date: self.date,
            }),
            "return" => Some(Command::Return {
                loan: LoanId(self.loan?),
                date: self.date,
            }),
            "renew" => Some(Command::Renew {
                loan: LoanId(self.loan?),
                due_date: self.date?,
            }),
            "delete" => Some(Command::Delete {
                loan: LoanId(self.loan?),
            }),
            _ => None,
        }
    }
}

fn apply(library: &Library, config: &LibraryConfig, command: Command) -> Result<(), LoanError> {
    match command {
        Command::AddBook { title, copies } => {
            library.store().add_book(NewBook::new(&title, copies))?;
        }
        Command::AddMember(row) => {
            let (first, last) = row.name.split_once(' ').unwrap_or((row.name.as_str(), ""));
            let new = NewMember::new(first, last, &row.email).with_status(row.status);
            library.add_member(new)?;
        }
        Command::SetStatus { member, status } => {
            library.store().set_membership_status(member, status)?;
        }
        Command::Open {
            book,
            member,
            due_date,
        } => {
            let due_date = due_date.unwrap_or_else(|| {
                let today = library.today();
                today
                    .checked_add_days(Days::new(config.default_loan_days.into()))
                    .unwrap_or(today)
            });
            library.open_loan(book, member, due_date)?;
        }
        Command::Return { loan, date } => {
            library.return_loan(loan, date)?;
        }
        Command::Renew { loan, due_date } => {
            library.renew_loan(loan, due_date)?;
        }
        Command::Delete { loan } => {
            library.delete_loan(loan)?;
        }
    }
    Ok(())
}

/// Replays commands from a CSV reader against `library`.
///
/// Rows are streamed, so arbitrarily large files are never loaded whole.
/// Malformed rows and rejected commands are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `op, book, member, loan, date, copies, status, name, email`
/// - `book`: register a title (`copies`, `name`); ids are assigned from 1
/// - `member`: register a member (`name`, `email`, optional `status`)
/// - `status`: change a member's `status`
/// - `open`: lend `book` to `member`, due on `date` (default loan period if empty)
/// - `return`: close `loan` on `date` (today if empty)
/// - `renew`: move `loan`'s due date to `date`
/// - `delete`: remove `loan`
///
/// # Example
///
/// ```csv
/// op,book,member,loan,date,copies,status,name,email
/// book,,,,,2,,Dune,
/// member,,,,,,active,Ada Lovelace,ada@example.org
/// open,1,1,,2024-01-01,,,,
/// return,,,1,2024-01-11,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_commands<R: Read>(
    library: &Library,
    config: &LibraryConfig,
    reader: R,
) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (line, result) in rdr.deserialize::<CommandRecord>().enumerate() {
        let row = line + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(row, "skipping malformed row: {e}");
                continue;
            }
        };

        let Some(command) = record.into_command() else {
            warn!(row, "skipping invalid command");
            continue;
        };

        if let Err(e) = apply(library, config, command) {
            warn!(row, "command rejected: {e}");
        }
    }

    Ok(())
}

/// Output row of the loan report.
#[derive(Debug, Serialize)]
struct LoanRow {
    loan: LoanId,
    book: BookId,
    member: MemberId,
    loan_date: NaiveDate,
    due_date: NaiveDate,
    return_date: Option<NaiveDate>,
    status: LoanStatus,
    fine: Decimal,
}

impl LoanRow {
    fn new(loan: &Loan, today: NaiveDate) -> Self {
        Self {
            loan: loan.id,
            book: loan.book_id,
            member: loan.member_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status: loan.effective_status(today),
            fine: loan.fine_amount.round_dp(Loan::MONEY_PRECISION),
        }
    }
}

/// Write every loan, in id order, to a CSV writer.
///
/// # CSV Format
///
/// Columns: `loan, book, member, loan_date, due_date, return_date, status, fine`
///
/// # Example
///
/// ```csv
/// loan,book,member,loan_date,due_date,return_date,status,fine
/// 1,1,1,2024-01-01,2024-01-01,2024-01-11,returned,5.00
/// 2,1,2,2024-01-01,2024-01-05,,overdue,0
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_loans<W: Write>(library: &Library, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    let today = library.today();

    for loan in library.list_loans(&LoanFilter::default()) {
        wtr.serialize(LoanRow::new(&loan, today))?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    const HEADER: &str = "op,book,member,loan,date,copies,status,name,email\n";

    fn library() -> Library {
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Library::from_config(&LibraryConfig::default(), FixedClock(today))
    }

    fn run(body: &str) -> Library {
        let library = library();
        let csv = format!("{HEADER}{body}");
        process_commands(&library, &LibraryConfig::default(), Cursor::new(csv)).unwrap();
        library
    }

    #[test]
    fn parse_open_and_return_sequence() {
        let library = run("book,,,,,2,,Dune,\n\
                           member,,,,,,,Ada Lovelace,ada@example.org\n\
                           open,1,1,,2024-01-01,,,,\n\
                           return,,,1,2024-01-11,,,,\n");

        let loan = library.store().get_loan(LoanId(1)).unwrap();
        assert_eq!(loan.status, LoanStatus::Returned);
        assert_eq!(loan.fine_amount, dec!(5.00));
        assert_eq!(library.store().get_book(BookId(1)).unwrap().available_copies(), 2);
    }

    #[test]
    fn open_without_date_uses_default_loan_period() {
        let library = run("book,,,,,1,,Dune,\n\
                           member,,,,,,,Ada Lovelace,ada@example.org\n\
                           open,1,1\n");

        let loan = library.store().get_loan(LoanId(1)).unwrap();
        assert_eq!(loan.due_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
    }

    #[test]
    fn rejected_commands_are_skipped() {
        let library = run("book,,,,,1,,Dune,\n\
                           member,,,,,,suspended,Ada Lovelace,ada@example.org\n\
                           open,1,1,,2024-01-10,,,,\n\
                           status,,1,,,,active,,\n\
                           open,1,1,,2024-01-10,,,,\n");

        let loans = library.list_loans(&LoanFilter::default());
        assert_eq!(loans.len(), 1);
        assert_eq!(loans[0].id, LoanId(1));
    }

    #[test]
    fn member_rows_carry_name_email_and_status() {
        let library = run("member,,,,,,expired,Ada King Lovelace, Ada@Example.org\n\
                           member,,,,,,,Plato,plato@example.org\n");

        let ada = library.store().get_member(MemberId(1)).unwrap();
        assert_eq!(ada.first_name, "Ada");
        assert_eq!(ada.last_name, "King Lovelace");
        assert_eq!(ada.email, "ada@example.org");
        assert_eq!(ada.membership_status, MembershipStatus::Expired);

        let plato = library.store().get_member(MemberId(2)).unwrap();
        assert_eq!(plato.last_name, "");
        assert_eq!(plato.membership_status, MembershipStatus::Active);
    }

    #[test]
    fn skip_malformed_rows() {
        let library = run("book,,,,,1,,Dune,\n\
                           fly,to,the,moon\n\
                           book,,,,,x,,Emma,\n\
                           book,,,,,3,,Emma,\n");

        assert_eq!(library.store().list_books(&Default::default()).len(), 2);
    }

    #[test]
    fn record_into_command() {
        let record = CommandRecord {
            op: "Renew".into(),
            book: None,
            member: None,
            loan: Some(4),
            date: NaiveDate::from_ymd_opt(2024, 2, 1),
            copies: None,
            status: None,
            name: None,
            email: None,
        };
        assert_eq!(
            record.into_command(),
            Some(Command::Renew {
                loan: LoanId(4),
                due_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            })
        );
    }

    #[test]
    fn write_loans_to_csv() {
        let library = run("book,,,,,2,,Dune,\n\
                           member,,,,,,,Ada Lovelace,ada@example.org\n\
                           open,1,1,,2024-01-01,,,,\n");

        let mut output = Vec::new();
        write_loans(&library, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("loan,book,member,loan_date,due_date,return_date,status,fine\n"));
        assert!(output.contains("1,1,1,2024-01-01,2024-01-01,,borrowed,0"));
    }
}
