// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands:
//
//   prepare-vocab  build the vocabulary (and optional embeddings)
//   train          train FastQA on SQuAD
//   evaluate       EM / F1 of the newest checkpoint
//   ask            answer one question against one context
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{prepare_vocab_use_case::PrepareVocabConfig, train_use_case::TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a vocabulary from a SQuAD training file
    PrepareVocab(PrepareVocabArgs),

    /// Train the FastQA model
    Train(TrainArgs),

    /// Score the latest checkpoint on a SQuAD file
    Evaluate(EvaluateArgs),

    /// Answer a question using the latest checkpoint
    Ask(AskArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Number of epochs
    #[arg(long, default_value_t = 100)]
    pub epoch: usize,

    #[arg(long, default_value_t = 32)]
    pub batch: usize,

    /// Embedding size (must match pretrained embeddings if present)
    #[arg(long, default_value_t = 300)]
    pub embed: usize,

    /// Hidden size of the encoder and pointers
    #[arg(long, default_value_t = 300)]
    pub hidden: usize,

    #[arg(long, default_value_t = 0.5)]
    pub dropout: f64,

    /// Maximum question length in tokens
    #[arg(long, default_value_t = 50)]
    pub q_len: usize,

    /// Maximum context length in tokens
    #[arg(long, default_value_t = 650)]
    pub c_len: usize,

    /// Evaluate dev F1 and write a step checkpoint every N steps
    #[arg(long, default_value_t = 1000)]
    pub steps: usize,

    #[arg(long, default_value = "data/train-v1.1.json")]
    pub train_path: String,

    /// Dev SQuAD file; without one, a share of train is held out
    #[arg(long)]
    pub dev_path: Option<String>,

    /// SQuAD file with reference answers (defaults to --dev-path)
    #[arg(long)]
    pub answer_path: Option<String>,

    /// Vocabulary written by prepare-vocab
    #[arg(long, default_value = "data/vocab_squad.json")]
    pub vocab_file: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Share of train kept for training when no dev file is given
    #[arg(long, default_value_t = 0.9)]
    pub train_fraction: f64,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Learning rate floor for the F1 scheduler
    #[arg(long, default_value_t = 1e-5)]
    pub min_lr: f64,

    /// Evaluations without F1 improvement before halving the learning rate
    #[arg(long, default_value_t = 1)]
    pub patience: usize,

    /// Longest answer span, in tokens, considered when decoding
    #[arg(long, default_value_t = 30)]
    pub max_answer_len: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Disable the word-in-question features
    #[arg(long)]
    pub without_feature: bool,

    /// Check every model output for NaN / inf
    #[arg(long)]
    pub debug: bool,

    /// Continue from the latest checkpoint in --checkpoint-dir
    #[arg(long)]
    pub resume: bool,

    /// Run on the NdArray CPU backend instead of WGPU
    #[arg(long)]
    pub cpu: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_path:     a.train_path,
            dev_path:       a.dev_path,
            answer_path:    a.answer_path,
            vocab_path:     a.vocab_file,
            checkpoint_dir: a.checkpoint_dir,
            epochs:         a.epoch,
            batch_size:     a.batch,
            embed_size:     a.embed,
            hidden_size:    a.hidden,
            dropout:        a.dropout,
            question_limit: a.q_len,
            context_limit:  a.c_len,
            steps:          a.steps,
            learning_rate:  a.lr,
            min_lr:         a.min_lr,
            patience:       a.patience,
            max_answer_len: a.max_answer_len,
            train_fraction: a.train_fraction,
            seed:           a.seed,
            features:       !a.without_feature,
            debug:          a.debug,
            resume:         a.resume,
            cpu:            a.cpu,
            vocab_size:     0,
        }
    }
}

#[derive(Args, Debug)]
pub struct PrepareVocabArgs {
    #[arg(long, default_value = "data/train-v1.1.json")]
    pub train_path: String,

    #[arg(long, default_value = "data/vocab_squad.json")]
    pub vocab_file: String,

    /// Drop tokens seen fewer times than this
    #[arg(long, default_value_t = 10)]
    pub min_freq: usize,

    /// Keep at most this many tokens (besides <pad> and <unk>)
    #[arg(long)]
    pub max_size: Option<usize>,

    #[arg(long)]
    pub lower: bool,

    /// GloVe text file to build aligned embeddings from
    #[arg(long)]
    pub glove: Option<String>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl From<PrepareVocabArgs> for PrepareVocabConfig {
    fn from(a: PrepareVocabArgs) -> Self {
        PrepareVocabConfig {
            train_path: a.train_path,
            vocab_path: a.vocab_file,
            min_freq:   a.min_freq,
            max_size:   a.max_size,
            lowercase:  a.lower,
            glove_path: a.glove,
            seed:       a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// SQuAD file to score against
    #[arg(long, default_value = "data/dev-v1.1.json")]
    pub data_path: String,

    #[arg(long, default_value = "data/vocab_squad.json")]
    pub vocab_file: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    #[arg(long)]
    pub question: String,

    /// Passage containing the answer
    #[arg(long)]
    pub context: String,

    #[arg(long, default_value = "data/vocab_squad.json")]
    pub vocab_file: String,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long)]
    pub cpu: bool,
}
