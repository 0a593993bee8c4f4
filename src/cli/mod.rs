// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its
// use case. Printing results to the user happens here and only
// here.

pub mod commands;

use anyhow::Result;
use burn::backend::{NdArray, Wgpu};
use clap::Parser;
use commands::{AskArgs, Commands, EvaluateArgs, PrepareVocabArgs, TrainArgs};

use crate::domain::traits::QuestionAnswerer;

#[derive(Parser, Debug)]
#[command(
    name = "fastqa",
    version = "0.1.0",
    about = "Train a FastQA extractive question-answering model on SQuAD."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::PrepareVocab(args) => run_prepare_vocab(args),
            Commands::Train(args) => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Ask(args) => run_ask(args),
        }
    }
}

fn run_prepare_vocab(args: PrepareVocabArgs) -> Result<()> {
    use crate::application::prepare_vocab_use_case::PrepareVocabUseCase;

    let vocab_file = args.vocab_file.clone();
    let vocab = PrepareVocabUseCase::new(args.into()).execute()?;
    println!("Vocabulary of {} tokens written to {}", vocab.len(), vocab_file);
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on '{}'", args.train_path);
    let checkpoint_dir = args.checkpoint_dir.clone();
    TrainUseCase::new(args.into()).execute()?;
    println!("Training complete. Checkpoints in '{}'.", checkpoint_dir);
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let score = EvaluateUseCase {
        data_path:      args.data_path,
        vocab_path:     args.vocab_file,
        checkpoint_dir: args.checkpoint_dir,
        cpu:            args.cpu,
    }
    .execute()?;
    println!("{}", serde_json::to_string_pretty(&score)?);
    Ok(())
}

fn run_ask(args: AskArgs) -> Result<()> {
    use crate::application::ask_use_case::AskUseCase;

    let answer = if args.cpu {
        AskUseCase::<NdArray>::new(&args.checkpoint_dir, &args.vocab_file, Default::default())?
            .answer(&args.question, &args.context)?
    } else {
        AskUseCase::<Wgpu>::new(&args.checkpoint_dir, &args.vocab_file, Default::default())?
            .answer(&args.question, &args.context)?
    };
    println!("\nAnswer: {}", answer);
    Ok(())
}
